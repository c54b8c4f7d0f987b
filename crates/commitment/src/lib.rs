//! Survey commitments: a sorted-pair Merkle root over the survey's fields,
//! inclusion proofs in the verifier's hex format, and the narrow oracle
//! interface those proofs are submitted through.

use field::Digest;
use merkle::{verify_proof, MerkleError, MerkleProof, SortedPairTree};
use thiserror::Error;

pub mod config;
pub mod oracle;
pub mod survey;

pub use config::CommitmentCfg;
pub use oracle::{LocalOracle, Rejection, Resolution, SurveyOracle};
pub use survey::{prove_fields, HexInclusionProof, Survey, SurveyCommitment};

#[derive(Debug, Error)]
pub enum CommitmentError {
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Wire(#[from] utils::WireError),

    #[error("option {option} out of range for a survey with {options} options")]
    UnknownOption { option: usize, options: usize },

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Trait for vector commitments over leaf digests.
pub trait CommitmentScheme {
    type Digest: Clone + core::fmt::Debug + PartialEq + Eq;
    type Proof: Clone + core::fmt::Debug;
    type Aux: Clone + core::fmt::Debug;

    /// Commit to leaves and return the digest plus whatever is needed to open later.
    fn commit(&self, leaves: &[Digest]) -> Result<(Self::Digest, Self::Aux), MerkleError>;

    fn open(&self, index: usize, aux: &Self::Aux) -> Result<Self::Proof, MerkleError>;

    fn verify(&self, root: &Self::Digest, value: &Digest, proof: &Self::Proof) -> bool;
}

/// Sorted-pair SHA-256 Merkle commitment. Leaves must already be padded.
#[derive(Clone, Copy, Debug, Default)]
pub struct SortedPairCommitment;

impl CommitmentScheme for SortedPairCommitment {
    type Digest = Digest;
    type Proof = MerkleProof;
    type Aux = SortedPairTree;

    fn commit(&self, leaves: &[Digest]) -> Result<(Self::Digest, Self::Aux), MerkleError> {
        let tree = SortedPairTree::new(leaves.to_vec())?;
        Ok((tree.root(), tree))
    }

    fn open(&self, index: usize, aux: &Self::Aux) -> Result<Self::Proof, MerkleError> {
        aux.open(index)
    }

    fn verify(&self, root: &Self::Digest, value: &Digest, proof: &Self::Proof) -> bool {
        verify_proof(value, &proof.siblings, root)
    }
}
