//! Binary Merkle commitments over SHA-256 with sorted-pair node hashing.
//!
//! A parent is `SHA256(min(a, b) || max(a, b))` under byte-wise order, so a
//! verifier only needs the sibling at each level, never its side.

use field::{hash_bytes, Digest, FieldError, SurveyField};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("invalid field count: at least one field is required")]
    InvalidFieldCount,

    #[error("leaf count {len} is not a power of two")]
    NonPowerOfTwoInput { len: usize },

    #[error("tracked index {index} out of range for {len} leaves")]
    TrackedIndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Canonical parent digest: the smaller operand is absorbed first.
pub fn hash_sorted_pair(a: &Digest, b: &Digest) -> Digest {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut h = Sha256::new();
    h.update(lo);
    h.update(hi);
    h.finalize().into()
}

// ========== Padding ==========

/// Smallest power of two `>= n`. Zero fields cannot form a tree.
pub fn next_power_of_two_len(n: usize) -> Result<usize, MerkleError> {
    if n == 0 {
        return Err(MerkleError::InvalidFieldCount);
    }
    Ok(n.next_power_of_two())
}

/// Encode `fields` into leaves and pad on the right with text leaves of
/// `placeholder` until the count is a power of two.
pub fn pad_to_power_of_two(
    fields: &[SurveyField],
    placeholder: &str,
) -> Result<Vec<Digest>, MerkleError> {
    let target = next_power_of_two_len(fields.len())?;

    let mut leaves = Vec::with_capacity(target);
    for f in fields {
        leaves.push(f.leaf()?);
    }
    if target > fields.len() {
        debug!(
            fields = fields.len(),
            padded = target,
            "padding survey fields to power of two"
        );
        leaves.resize(target, SurveyField::text(placeholder).leaf()?);
    }
    Ok(leaves)
}

/// Digest-level variant of [`pad_to_power_of_two`] for callers that already hold leaves.
pub fn pad_leaves(mut leaves: Vec<Digest>, placeholder: Digest) -> Result<Vec<Digest>, MerkleError> {
    let target = next_power_of_two_len(leaves.len())?;
    leaves.resize(target, placeholder);
    Ok(leaves)
}

// ========== Reduction ==========

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reduction {
    pub root: Digest,
    /// Siblings in round order, leaf level first.
    pub proof: Vec<Digest>,
    /// Index of the tracked node in the final (single-node) level.
    pub tracked: usize,
}

/// Reduce a power-of-two leaf sequence to its root while collecting the
/// inclusion proof of `leaves[tracked]`.
///
/// Siblings are appended to `proof`, one per round, taken from the level
/// before it is paired.
pub fn reduce(
    leaves: &[Digest],
    mut proof: Vec<Digest>,
    tracked: usize,
) -> Result<Reduction, MerkleError> {
    let n = leaves.len();
    if !n.is_power_of_two() {
        return Err(MerkleError::NonPowerOfTwoInput { len: n });
    }
    if tracked >= n {
        return Err(MerkleError::TrackedIndexOutOfRange { index: tracked, len: n });
    }

    let mut tracked = tracked;
    let mut cur: Vec<Digest> = leaves.to_vec();
    let mut next: Vec<Digest> = Vec::with_capacity(n / 2);
    proof.reserve(n.trailing_zeros() as usize);

    let mut round = 0u32;
    while cur.len() > 1 {
        // The pair holding `tracked` is (tracked & !1, tracked | 1).
        proof.push(cur[tracked ^ 1]);
        tracked >>= 1;

        next.clear();
        next.extend(cur.chunks_exact(2).map(|p| hash_sorted_pair(&p[0], &p[1])));
        std::mem::swap(&mut cur, &mut next);

        trace!(round, width = cur.len(), tracked, "merkle round");
        round += 1;
    }

    Ok(Reduction {
        root: cur[0],
        proof,
        tracked,
    })
}

/// Fold `leaf` through `proof` with the sorted-pair rule.
pub fn compute_root(leaf: &Digest, proof: &[Digest]) -> Digest {
    proof
        .iter()
        .fold(*leaf, |acc, sibling| hash_sorted_pair(&acc, sibling))
}

/// What an on-chain sorted-pair verifier does: recompute and compare.
pub fn verify_proof(leaf: &Digest, proof: &[Digest], root: &Digest) -> bool {
    compute_root(leaf, proof) == *root
}

// ========== Proofs and trees ==========

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf: Digest,
    pub siblings: Vec<Digest>,
}

impl MerkleProof {
    pub fn verify(&self, root: &Digest) -> bool {
        verify_proof(&self.leaf, &self.siblings, root)
    }
}

/// Tree that keeps every level so several leaves can be opened from one build.
///
/// Only the leaves are serialized; loading rebuilds the levels through
/// [`SortedPairTree::new`], so a stored tree gets the same checks as a fresh one.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "TreeLeaves", into = "TreeLeaves")]
pub struct SortedPairTree {
    // level 0 = leaves, last level = [root]
    levels: Vec<Vec<Digest>>,
}

#[derive(Serialize, Deserialize)]
struct TreeLeaves {
    leaves: Vec<Digest>,
}

impl TryFrom<TreeLeaves> for SortedPairTree {
    type Error = MerkleError;

    fn try_from(t: TreeLeaves) -> Result<Self, Self::Error> {
        Self::new(t.leaves)
    }
}

impl From<SortedPairTree> for TreeLeaves {
    fn from(tree: SortedPairTree) -> Self {
        Self {
            leaves: tree.levels.into_iter().next().unwrap_or_default(),
        }
    }
}

impl SortedPairTree {
    pub fn new(leaves: Vec<Digest>) -> Result<Self, MerkleError> {
        if !leaves.len().is_power_of_two() {
            return Err(MerkleError::NonPowerOfTwoInput { len: leaves.len() });
        }

        let mut levels = vec![leaves];
        while let Some(cur) = levels.last().filter(|l| l.len() > 1) {
            let next: Vec<Digest> = cur
                .chunks_exact(2)
                .map(|p| hash_sorted_pair(&p[0], &p[1]))
                .collect();
            levels.push(next);
        }
        debug!(leaves = levels[0].len(), height = levels.len() - 1, "built sorted-pair tree");
        Ok(Self { levels })
    }

    /// Hash the encoded fields, pad them and build the tree.
    pub fn from_fields(fields: &[SurveyField], placeholder: &str) -> Result<Self, MerkleError> {
        Self::new(pad_to_power_of_two(fields, placeholder)?)
    }

    pub fn root(&self) -> Digest {
        self.levels[self.levels.len() - 1][0]
    }

    pub fn height(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn leaves(&self) -> &[Digest] {
        &self.levels[0]
    }

    pub fn open(&self, index: usize) -> Result<MerkleProof, MerkleError> {
        let len = self.leaf_count();
        if index >= len {
            return Err(MerkleError::TrackedIndexOutOfRange { index, len });
        }
        let mut idx = index;
        let mut siblings = Vec::with_capacity(self.height());
        for level in &self.levels[..self.height()] {
            siblings.push(level[idx ^ 1]);
            idx >>= 1;
        }
        Ok(MerkleProof {
            leaf_index: index,
            leaf: self.levels[0][index],
            siblings,
        })
    }
}

/// Leaf digest of a raw text value, as used for placeholders.
pub fn text_leaf(value: &str) -> Digest {
    hash_bytes(value.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use field::encode_timestamp_hex;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_leaves(rng: &mut StdRng, n: usize) -> Vec<Digest> {
        (0..n).map(|_| rng.gen::<[u8; 32]>()).collect()
    }

    #[test]
    fn hello_world_two_leaves() {
        let a = text_leaf("Hello");
        let b = text_leaf("World!");

        let mut cat = Vec::with_capacity(64);
        cat.extend_from_slice(if a < b { &a } else { &b });
        cat.extend_from_slice(if a < b { &b } else { &a });
        let expected = hash_bytes(&cat);

        let red = reduce(&[a, b], Vec::new(), 0).unwrap();
        assert_eq!(red.root, expected);
        assert_eq!(red.proof, vec![b]);
        assert_eq!(red.tracked, 0);
        assert!(verify_proof(&a, &red.proof, &red.root));
        assert_eq!(
            field::encode_u256_hex(&red.root),
            "4a4581226bce4a793ab3e078779f40f170d64d709fab1fcf478b1dc3603c4b6c"
        );
    }

    #[test]
    fn single_leaf_is_root() {
        let x = [9u8; 32];
        let red = reduce(&[x], Vec::new(), 0).unwrap();
        assert_eq!(red, Reduction { root: x, proof: vec![], tracked: 0 });
    }

    #[test]
    fn proof_length_is_log2() {
        let mut rng = StdRng::seed_from_u64(11);
        for k in 0..8u32 {
            let n = 1usize << k;
            let leaves = random_leaves(&mut rng, n);
            let red = reduce(&leaves, Vec::new(), n - 1).unwrap();
            assert_eq!(red.proof.len(), k as usize);
            assert_eq!(red.tracked, 0);
        }
    }

    #[test]
    fn every_index_roundtrips() {
        let mut rng = StdRng::seed_from_u64(123);
        let leaves = random_leaves(&mut rng, 64);
        let tree = SortedPairTree::new(leaves.clone()).unwrap();
        for i in 0..leaves.len() {
            let red = reduce(&leaves, Vec::new(), i).unwrap();
            assert_eq!(red.root, tree.root());
            assert!(verify_proof(&leaves[i], &red.proof, &red.root));

            // The retained tree opens the same path.
            let opened = tree.open(i).unwrap();
            assert_eq!(opened.siblings, red.proof);
            assert!(opened.verify(&tree.root()));
        }
    }

    #[test]
    fn deterministic() {
        let mut rng = StdRng::seed_from_u64(5);
        let leaves = random_leaves(&mut rng, 16);
        let r1 = reduce(&leaves, Vec::new(), 6).unwrap();
        let r2 = reduce(&leaves, Vec::new(), 6).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn existing_proof_prefix_is_kept() {
        let mut rng = StdRng::seed_from_u64(6);
        let leaves = random_leaves(&mut rng, 4);
        let prefix = [0xeeu8; 32];
        let red = reduce(&leaves, vec![prefix], 2).unwrap();
        assert_eq!(red.proof.len(), 3);
        assert_eq!(red.proof[0], prefix);
        assert!(verify_proof(&leaves[2], &red.proof[1..], &red.root));
    }

    #[test]
    fn reduce_rejects_bad_input() {
        let leaves = [[1u8; 32], [2u8; 32], [3u8; 32]];
        assert_eq!(
            reduce(&leaves, Vec::new(), 0),
            Err(MerkleError::NonPowerOfTwoInput { len: 3 })
        );
        assert_eq!(
            reduce(&[], Vec::new(), 0),
            Err(MerkleError::NonPowerOfTwoInput { len: 0 })
        );
        assert_eq!(
            reduce(&leaves[..2], Vec::new(), 2),
            Err(MerkleError::TrackedIndexOutOfRange { index: 2, len: 2 })
        );
        assert!(SortedPairTree::new(leaves.to_vec()).is_err());
    }

    #[test]
    fn padding_appends_placeholder_text_leaves() {
        let fields = vec![
            SurveyField::text("Q"),
            SurveyField::timestamp(1_700_000_000),
            SurveyField::text("A"),
            SurveyField::text("B"),
            SurveyField::text("C"),
        ];
        let padded = pad_to_power_of_two(&fields, "").unwrap();
        assert_eq!(padded.len(), 8);
        for leaf in &padded[5..] {
            assert_eq!(*leaf, text_leaf(""));
        }
        assert_eq!(padded[1], fields[1].leaf().unwrap());
    }

    #[test]
    fn padding_is_idempotent_at_power_of_two() {
        let fields: Vec<SurveyField> = ["a", "b", "c", "d"].iter().map(|s| SurveyField::text(*s)).collect();
        let padded = pad_to_power_of_two(&fields, "pad").unwrap();
        let plain: Vec<Digest> = fields.iter().map(|f| f.leaf().unwrap()).collect();
        assert_eq!(padded, plain);
        assert!(!padded.contains(&text_leaf("pad")));

        let single = pad_to_power_of_two(&[SurveyField::text("only")], "pad").unwrap();
        assert_eq!(single, vec![text_leaf("only")]);
    }

    #[test]
    fn placeholder_never_hex_decoded() {
        // A placeholder that happens to be valid 64-char hex is still hashed as text.
        let hexish = encode_timestamp_hex(42);
        let fields = vec![SurveyField::text("Q"), SurveyField::text("A"), SurveyField::text("B")];
        let padded = pad_to_power_of_two(&fields, &hexish).unwrap();
        assert_eq!(padded[3], text_leaf(&hexish));
    }

    #[test]
    fn padding_errors() {
        assert_eq!(pad_to_power_of_two(&[], ""), Err(MerkleError::InvalidFieldCount));
        assert_eq!(pad_leaves(Vec::new(), [0u8; 32]), Err(MerkleError::InvalidFieldCount));

        let fields = vec![SurveyField::text("Q"), SurveyField::hex_timestamp("not hex")];
        assert!(matches!(
            pad_to_power_of_two(&fields, ""),
            Err(MerkleError::Field(FieldError::MalformedHexField { .. }))
        ));
    }

    #[test]
    fn pad_leaves_digest_level() {
        let padded = pad_leaves(vec![[1u8; 32]; 5], [0u8; 32]).unwrap();
        assert_eq!(padded.len(), 8);
        assert_eq!(&padded[5..], &[[0u8; 32]; 3]);
    }

    #[test]
    fn four_field_timestamp_proof() {
        let ts = encode_timestamp_hex(1_717_171_717);
        let fields = vec![
            SurveyField::text("Q"),
            SurveyField::hex_timestamp(ts),
            SurveyField::text("OptA"),
            SurveyField::text("OptB"),
        ];
        let leaves = pad_to_power_of_two(&fields, "").unwrap();
        let red = reduce(&leaves, Vec::new(), 1).unwrap();
        assert_eq!(red.proof.len(), 2);
        assert_eq!(red.proof[0], leaves[0]);
        assert_eq!(red.proof[1], hash_sorted_pair(&leaves[2], &leaves[3]));
        assert_eq!(compute_root(&leaves[1], &red.proof), red.root);
    }

    #[test]
    fn proof_for_wrong_leaf_verifies_only_that_leaf() {
        let ts = encode_timestamp_hex(1_717_171_717);
        let fields = vec![
            SurveyField::text("Q"),
            SurveyField::hex_timestamp(ts),
            SurveyField::text("OptA"),
            SurveyField::text("OptB"),
        ];
        let leaves = pad_to_power_of_two(&fields, "").unwrap();

        // Caller meant the timestamp (index 1) but tracked the question (index 0).
        let red = reduce(&leaves, Vec::new(), 0).unwrap();
        assert!(verify_proof(&leaves[0], &red.proof, &red.root));
        assert!(!verify_proof(&leaves[1], &red.proof, &red.root));
    }

    #[test]
    fn tampered_proof_fails() {
        let mut rng = StdRng::seed_from_u64(77);
        let leaves = random_leaves(&mut rng, 8);
        let red = reduce(&leaves, Vec::new(), 3).unwrap();
        let mut bad = red.proof.clone();
        bad[1][0] ^= 1;
        assert!(!verify_proof(&leaves[3], &bad, &red.root));
        assert!(!verify_proof(&leaves[3], &red.proof[..2], &red.root));
    }

    #[test]
    fn tree_accessors_and_serde() {
        let tree = SortedPairTree::from_fields(
            &[SurveyField::text("x"), SurveyField::text("y"), SurveyField::text("z")],
            "",
        )
        .unwrap();
        assert_eq!(tree.leaf_count(), 4);
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.leaves()[3], text_leaf(""));
        assert!(tree.open(4).is_err());

        let proof = tree.open(2).unwrap();
        assert_eq!(proof.siblings.len(), 2);
        let json = serde_json::to_string(&proof).unwrap();
        let back: MerkleProof = serde_json::from_str(&json).unwrap();
        assert_eq!(back, proof);
        assert!(back.verify(&tree.root()));
    }

    #[test]
    fn tree_serde_rebuilds_levels() {
        let mut rng = StdRng::seed_from_u64(31);
        let tree = SortedPairTree::new(random_leaves(&mut rng, 8)).unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["leaves"].as_array().map(|a| a.len()), Some(8));

        let back: SortedPairTree = serde_json::from_value(json).unwrap();
        assert_eq!(back.root(), tree.root());
        assert_eq!(back.height(), 3);
        assert!(back.open(5).unwrap().verify(&tree.root()));
    }

    #[test]
    fn tree_serde_rejects_bad_leaf_counts() {
        let empty = serde_json::json!({ "leaves": [] });
        assert!(serde_json::from_value::<SortedPairTree>(empty).is_err());

        let three = serde_json::json!({ "leaves": [([1u8; 32]), ([2u8; 32]), ([3u8; 32])] });
        let err = serde_json::from_value::<SortedPairTree>(three).unwrap_err();
        assert!(err.to_string().contains("not a power of two"));

        // Extra keys such as hand-written levels are not trusted.
        let x = [4u8; 32];
        let y = [5u8; 32];
        let forged = serde_json::json!({ "leaves": [x, y], "levels": [[x, y], [x]] });
        let tree: SortedPairTree = serde_json::from_value(forged).unwrap();
        assert_eq!(tree.root(), hash_sorted_pair(&x, &y));
        assert!(tree.open(0).unwrap().verify(&tree.root()));
    }

    proptest! {
        #[test]
        fn pair_hash_is_order_independent(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            prop_assert_eq!(hash_sorted_pair(&a, &b), hash_sorted_pair(&b, &a));
        }

        #[test]
        fn reduce_roundtrips(k in 0u32..7, seed in any::<u64>(), pick in any::<usize>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let n = 1usize << k;
            let leaves = random_leaves(&mut rng, n);
            let idx = pick % n;
            let red = reduce(&leaves, Vec::new(), idx).unwrap();
            prop_assert_eq!(red.proof.len(), k as usize);
            prop_assert!(verify_proof(&leaves[idx], &red.proof, &red.root));
        }
    }
}
