use field::{Digest, FieldError, SurveyField};
use merkle::{
    pad_leaves, pad_to_power_of_two, reduce, MerkleError, MerkleProof, Reduction, SortedPairTree,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utils::{encode_proof, to_prefixed_hex};

use crate::oracle::{Rejection, SurveyOracle};
use crate::{CommitmentCfg, CommitmentError, CommitmentScheme, SortedPairCommitment};

pub const QUESTION_INDEX: usize = 0;
pub const DEADLINE_INDEX: usize = 1;
pub const FIRST_OPTION_INDEX: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub question: String,
    /// Unix seconds; committed as a 256-bit big-endian integer.
    pub deadline: u64,
    pub options: Vec<String>,
}

impl Survey {
    pub fn new(question: impl Into<String>, deadline: u64, options: Vec<String>) -> Self {
        Self {
            question: question.into(),
            deadline,
            options,
        }
    }

    /// Question, deadline, then the options in order.
    pub fn fields(&self) -> Vec<SurveyField> {
        let mut out = Vec::with_capacity(FIRST_OPTION_INDEX + self.options.len());
        out.push(SurveyField::text(&self.question));
        out.push(SurveyField::timestamp(self.deadline));
        out.extend(self.options.iter().map(|o| SurveyField::text(o.as_str())));
        out
    }
}

/// Inclusion proof in the verifier's literal format (`0x` + lowercase hex).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexInclusionProof {
    pub proof: Vec<String>,
    pub root: String,
    pub leaf: String,
}

impl HexInclusionProof {
    pub fn new(leaf: &Digest, siblings: &[Digest], root: &Digest) -> Self {
        let (proof, root) = encode_proof(siblings, root);
        Self {
            proof,
            root,
            leaf: to_prefixed_hex(leaf),
        }
    }

    /// Hand the proof to a verifier; its rejections pass through untouched.
    pub fn submit<O: SurveyOracle + ?Sized>(&self, oracle: &O) -> Result<bool, Rejection> {
        oracle.verify(&self.proof, &self.root, &self.leaf)
    }
}

/// Pad `fields` and reduce them in one pass, proving the leaf at `index`
/// (an index into the padded sequence).
pub fn prove_fields(
    fields: &[SurveyField],
    placeholder: &str,
    index: usize,
) -> Result<Reduction, CommitmentError> {
    let leaves = pad_to_power_of_two(fields, placeholder)?;
    Ok(reduce(&leaves, Vec::new(), index)?)
}

/// A committed survey: the padded leaves and every tree level, ready to open
/// any field.
#[derive(Clone, Debug)]
pub struct SurveyCommitment {
    tree: SortedPairTree,
    root: Digest,
    field_count: usize,
}

impl SurveyCommitment {
    pub fn build(survey: &Survey, cfg: &CommitmentCfg) -> Result<Self, CommitmentError> {
        Self::from_fields(&survey.fields(), cfg)
    }

    pub fn from_fields(fields: &[SurveyField], cfg: &CommitmentCfg) -> Result<Self, CommitmentError> {
        let leaves = fields
            .iter()
            .map(SurveyField::leaf)
            .collect::<Result<Vec<_>, FieldError>>()
            .map_err(MerkleError::from)?;
        let leaves = pad_leaves(leaves, cfg.placeholder_leaf())?;
        let (root, tree) = SortedPairCommitment.commit(&leaves)?;
        debug!(
            fields = fields.len(),
            leaves = tree.leaf_count(),
            root = %to_prefixed_hex(&root),
            "committed survey"
        );
        Ok(Self {
            tree,
            root,
            field_count: fields.len(),
        })
    }

    pub fn root(&self) -> Digest {
        self.root
    }

    pub fn root_hex(&self) -> String {
        to_prefixed_hex(&self.root)
    }

    /// Number of real fields, excluding padding.
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn leaf_count(&self) -> usize {
        self.tree.leaf_count()
    }

    pub fn leaf(&self, index: usize) -> Option<Digest> {
        self.tree.leaves().get(index).copied()
    }

    pub fn prove(&self, index: usize) -> Result<MerkleProof, CommitmentError> {
        Ok(SortedPairCommitment.open(index, &self.tree)?)
    }

    pub fn prove_hex(&self, index: usize) -> Result<HexInclusionProof, CommitmentError> {
        let p = self.prove(index)?;
        Ok(HexInclusionProof::new(&p.leaf, &p.siblings, &self.root))
    }

    pub fn prove_deadline(&self) -> Result<HexInclusionProof, CommitmentError> {
        self.prove_hex(DEADLINE_INDEX)
    }

    /// Proof for the `option`-th option; padding leaves are never reachable here.
    pub fn prove_option(&self, option: usize) -> Result<HexInclusionProof, CommitmentError> {
        let options = self.field_count.saturating_sub(FIRST_OPTION_INDEX);
        match FIRST_OPTION_INDEX.checked_add(option) {
            Some(index) if index < self.field_count => self.prove_hex(index),
            _ => Err(CommitmentError::UnknownOption { option, options }),
        }
    }
}
