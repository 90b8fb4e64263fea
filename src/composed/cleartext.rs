//! The cleartext signature framework.
//! Ref: https://www.rfc-editor.org/rfc/rfc9580.html#section-7

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rand::{CryptoRng, Rng};

use crate::armor::{self, BlockType};
use crate::composed::shared::Deserializable;
use crate::composed::signed_key::SignedSecretKey;
use crate::composed::StandaloneSignature;
use crate::errors::{Error, Result};
use crate::normalize_lines::{cleartext_body, cleartext_hash_text};
use crate::packet::{Signature, SignatureConfig, SignatureType};
use crate::ser::Serialize;
use crate::types::{PublicKeyTrait, SecretKeyTrait};

/// A cleartext signed message: human readable text plus the signatures
/// over its canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleartextSignedMessage {
    /// The message text, with normalized line endings and per-line
    /// trailing whitespace already stripped.
    text: String,
    signatures: Vec<Signature>,
}

impl CleartextSignedMessage {
    /// Signs the given text with the primary key.
    pub fn sign<R: Rng + CryptoRng>(
        rng: &mut R,
        text: &str,
        key: &SignedSecretKey,
        key_pw: &str,
    ) -> Result<Self> {
        let config = SignatureConfig::from_key(rng, &key.primary_key, SignatureType::Text)?;
        let signature = config.sign(&key.primary_key, key_pw, &cleartext_hash_text(text))?;

        Ok(CleartextSignedMessage {
            text: cleartext_body(text),
            signatures: vec![signature],
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Verifies the first matching signature over the canonical text.
    pub fn verify(&self, key: &impl PublicKeyTrait) -> Result<()> {
        let content = cleartext_hash_text(&self.text);

        let mut last_err = None;
        for sig in &self.signatures {
            match sig.verify(key, &content) {
                Ok(()) => return Ok(()),
                Err(err) => last_err = Some(err),
            }
        }

        Err(last_err.unwrap_or_else(|| Error::SignatureError("no signatures".into())))
    }

    /// The armored cleartext framing, with dash escaped text and the
    /// armored signature block.
    pub fn to_armored_string(&self, headers: Option<&BTreeMap<String, String>>) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "-----BEGIN PGP SIGNED MESSAGE-----").expect("write to string");

        let mut hashes: Vec<&str> = self
            .signatures
            .iter()
            .map(|sig| sig.config.hash_alg.name())
            .collect();
        hashes.sort_unstable();
        hashes.dedup();
        writeln!(out, "Hash: {}", hashes.join(",")).expect("write to string");
        writeln!(out).expect("write to string");

        for line in self.text.split('\n') {
            if line.starts_with('-') {
                writeln!(out, "- {}", line).expect("write to string");
            } else {
                writeln!(out, "{}", line).expect("write to string");
            }
        }

        let standalone = StandaloneSignature::new(self.signatures[0].clone());
        let mut sig_block = standalone.to_bytes()?;
        for sig in &self.signatures[1..] {
            sig_block.extend(StandaloneSignature::new(sig.clone()).to_bytes()?);
        }

        out.push_str(&armor::write_string(
            &BlockType::Signature,
            headers,
            &sig_block,
        )?);

        Ok(out)
    }

    /// Parses a cleartext framed message.
    pub fn from_string(input: &str) -> Result<Self> {
        let rest = input
            .split_once("-----BEGIN PGP SIGNED MESSAGE-----")
            .map(|(_, rest)| rest)
            .ok_or_else(|| Error::InvalidArmor("missing cleartext header".into()))?;
        // drop the line break terminating the marker line
        let rest = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);

        // skip the Hash (and other) headers up to the first empty line
        let mut lines = rest.lines();
        for line in lines.by_ref() {
            if line.trim().is_empty() {
                break;
            }
            crate::ensure!(
                line.contains(": ") || line.trim().is_empty(),
                "invalid cleartext header {:?}",
                line
            );
        }

        // collect the dash escaped text until the signature block
        let mut text_lines = Vec::new();
        let mut in_signature = false;
        let mut signature_text = String::new();

        for line in lines {
            if line.starts_with("-----BEGIN PGP SIGNATURE-----") {
                in_signature = true;
            }

            if in_signature {
                signature_text.push_str(line);
                signature_text.push('\n');
            } else {
                let line = line.strip_prefix("- ").unwrap_or(line);
                text_lines.push(line);
            }
        }

        crate::ensure!(in_signature, "missing signature block");

        // the line break before the signature block belongs to the frame
        if text_lines.last() == Some(&"") {
            text_lines.pop();
        }
        let text = cleartext_body(&text_lines.join("\n"));

        let signatures = StandaloneSignature::from_string_many(&signature_text)?
            .into_iter()
            .map(|s| s.signature)
            .collect::<Vec<_>>();
        crate::ensure!(!signatures.is_empty(), "missing signatures");

        Ok(CleartextSignedMessage { text, signatures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dash_escape_roundtrip() {
        // escaping is applied on write
        let text = "normal line\n- leading dash\n-----fake header";
        let escaped: Vec<String> = text
            .split('\n')
            .map(|l| {
                if l.starts_with('-') {
                    format!("- {}", l)
                } else {
                    l.to_string()
                }
            })
            .collect();
        assert_eq!(escaped[1], "- - leading dash");
        assert_eq!(escaped[2], "- -----fake header");

        // and undone on parse
        let unescaped: Vec<&str> = escaped
            .iter()
            .map(|l| l.strip_prefix("- ").unwrap_or(l))
            .collect();
        assert_eq!(unescaped.join("\n"), text);
    }
}
