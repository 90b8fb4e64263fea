use std::io;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::errors::Result;
use crate::packet::{self, Signature, SignatureType, UserAttribute, UserId};
use crate::ser::Serialize;
use crate::types::{KeyId, PublicKeyTrait, Tag};

/// A user id with the certifications bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUser {
    pub id: UserId,
    pub self_certifications: Vec<Signature>,
    pub other_certifications: Vec<Signature>,
    pub revocation_certifications: Vec<Signature>,
}

impl SignedUser {
    /// Sorts the certifications following a user id packet into the
    /// buckets of the key graph. `primary_id` decides what counts as a
    /// self certification.
    pub fn new(id: UserId, signatures: Vec<Signature>, primary_id: &KeyId) -> Self {
        let mut self_certifications = Vec::new();
        let mut other_certifications = Vec::new();
        let mut revocation_certifications = Vec::new();

        for sig in signatures {
            if sig.typ() == SignatureType::CertRevocation {
                revocation_certifications.push(sig);
            } else if sig.issuer().map(|id| id == primary_id).unwrap_or(true) {
                self_certifications.push(sig);
            } else {
                other_certifications.push(sig);
            }
        }

        SignedUser {
            id,
            self_certifications,
            other_certifications,
            revocation_certifications,
        }
    }

    /// At least one self certification must verify against the primary.
    pub fn verify(&self, primary: &impl PublicKeyTrait) -> Result<()> {
        crate::ensure!(
            !self.self_certifications.is_empty(),
            "missing self certification for {:?}",
            self.id.id()
        );

        let mut last_err = None;
        for sig in &self.self_certifications {
            match sig.verify_certification(primary, primary, &self.id) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!("invalid self certification: {:?}", err);
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.expect("at least one certification"))
    }

    /// Whether this user is usable at `t`: some self certification
    /// verifies, was created before `t` and is not revoked by a later
    /// valid certification revocation.
    pub fn is_valid_at(&self, primary: &impl PublicKeyTrait, t: DateTime<Utc>) -> bool {
        for sig in &self.self_certifications {
            let created_ok = sig.created().map(|c| *c <= t).unwrap_or(false);
            if !created_ok || sig.verify_certification(primary, primary, &self.id).is_err() {
                continue;
            }

            let revoked = self.revocation_certifications.iter().any(|rev| {
                rev.issuer() == sig.issuer()
                    && rev.created() >= sig.created()
                    && rev.created().map(|c| *c <= t).unwrap_or(false)
                    && rev
                        .verify_certification(primary, primary, &self.id)
                        .is_ok()
            });

            if revoked {
                warn!("user {:?} is revoked", self.id.id());
                continue;
            }

            return true;
        }

        false
    }

    /// True if any valid self certification marks this user primary.
    pub fn is_primary(&self) -> bool {
        self.self_certifications.iter().any(|sig| sig.is_primary())
    }
}

impl Serialize for SignedUser {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, Tag::UserId, &self.id)?;
        for sig in self
            .self_certifications
            .iter()
            .chain(self.other_certifications.iter())
            .chain(self.revocation_certifications.iter())
        {
            packet::write_packet(writer, Tag::Signature, sig)?;
        }

        Ok(())
    }
}

/// A user attribute with the certifications bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUserAttribute {
    pub attr: UserAttribute,
    pub signatures: Vec<Signature>,
}

impl SignedUserAttribute {
    pub fn new(attr: UserAttribute, signatures: Vec<Signature>) -> Self {
        SignedUserAttribute { attr, signatures }
    }

    pub fn verify(&self, primary: &impl PublicKeyTrait) -> Result<()> {
        crate::ensure!(
            !self.signatures.is_empty(),
            "missing certification for user attribute"
        );

        let mut last_err = None;
        for sig in &self.signatures {
            match sig.verify_certification(primary, primary, &self.attr) {
                Ok(()) => return Ok(()),
                Err(err) => last_err = Some(err),
            }
        }

        Err(last_err.expect("at least one certification"))
    }
}

impl Serialize for SignedUserAttribute {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        packet::write_packet(writer, Tag::UserAttribute, &self.attr)?;
        for sig in &self.signatures {
            packet::write_packet(writer, Tag::Signature, sig)?;
        }

        Ok(())
    }
}
