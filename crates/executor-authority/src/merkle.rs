//! Keccak Merkle tree with canonical ordering.
//!
//! Leaves are sorted before layering and sibling pairs are sorted before
//! hashing, so the root is independent of insertion order and proofs carry
//! no position bits. An odd node at the end of a layer is promoted unhashed.

use alloy_primitives::{keccak256, B256};

/// Hashes a sibling pair in canonical order.
fn hash_pair(a: B256, b: B256) -> B256 {
	let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
	let mut buf = [0u8; 64];
	buf[..32].copy_from_slice(lo.as_slice());
	buf[32..].copy_from_slice(hi.as_slice());
	keccak256(buf)
}

/// A fully materialized Merkle tree over pre-hashed leaves.
#[derive(Debug, Clone)]
pub struct MerkleTree {
	layers: Vec<Vec<B256>>,
}

impl MerkleTree {
	/// Builds the tree. Input order is irrelevant.
	pub fn new(mut leaves: Vec<B256>) -> Self {
		leaves.sort();

		let mut layers = vec![leaves];
		while layers.last().map(Vec::len).unwrap_or(0) > 1 {
			let current = layers.last().unwrap();
			let next = current
				.chunks(2)
				.map(|pair| match pair {
					[a, b] => hash_pair(*a, *b),
					[a] => *a,
					_ => unreachable!(),
				})
				.collect();
			layers.push(next);
		}

		Self { layers }
	}

	/// The canonical root. Zero for an empty tree.
	pub fn root(&self) -> B256 {
		self.layers
			.last()
			.and_then(|layer| layer.first())
			.copied()
			.unwrap_or(B256::ZERO)
	}

	/// The ordered sibling path for `leaf`, or `None` when the leaf is not
	/// part of the tree.
	pub fn proof(&self, leaf: B256) -> Option<Vec<B256>> {
		let mut index = self.layers.first()?.iter().position(|l| *l == leaf)?;

		let mut proof = Vec::new();
		for layer in &self.layers[..self.layers.len().saturating_sub(1)] {
			let sibling = if index % 2 == 0 { index + 1 } else { index - 1 };
			if let Some(hash) = layer.get(sibling) {
				proof.push(*hash);
			}
			index /= 2;
		}
		Some(proof)
	}

	/// Verifies a proof against a root.
	pub fn verify(root: B256, leaf: B256, proof: &[B256]) -> bool {
		proof.iter().fold(leaf, |acc, sibling| hash_pair(acc, *sibling)) == root
	}
}
