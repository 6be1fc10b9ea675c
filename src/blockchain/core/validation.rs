use crate::blockchain::core::chain::{Block, GENESIS_INDEX, GENESIS_PREVIOUS_HASH};
use crate::miner::valid_proof;
use thiserror::Error;

/// First structural defect found in a candidate chain.
///
/// Defects are never surfaced to callers as errors; the ledger only reports
/// whether a chain is acceptable. The reason is kept for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainDefect {
    #[error("chain is empty")]
    Empty,
    #[error("malformed genesis block: {0}")]
    BadGenesis(&'static str),
    #[error("block {index} does not link to its predecessor")]
    BrokenLink { index: u64 },
    #[error("block {index} carries an invalid proof")]
    BadProof { index: u64 },
}

/// Walk `chain` from genesis and report the first defect.
pub fn check_chain(chain: &[Block], difficulty: usize) -> Result<(), ChainDefect> {
    let genesis = chain.first().ok_or(ChainDefect::Empty)?;

    if genesis.index != GENESIS_INDEX {
        return Err(ChainDefect::BadGenesis("index must be 1"));
    }
    if genesis.previous_hash != GENESIS_PREVIOUS_HASH {
        return Err(ChainDefect::BadGenesis("previous_hash must be \"0\""));
    }
    if genesis.transactions.len() != 1 || !genesis.transactions[0].is_root() {
        return Err(ChainDefect::BadGenesis("must hold exactly one ROOT transaction"));
    }

    for pair in chain.windows(2) {
        let (previous, block) = (&pair[0], &pair[1]);
        if block.previous_hash != previous.hash() {
            return Err(ChainDefect::BrokenLink { index: block.index });
        }
        if !valid_proof(previous.proof, block.proof, difficulty) {
            return Err(ChainDefect::BadProof { index: block.index });
        }
    }

    Ok(())
}

pub fn validate_chain(chain: &[Block], difficulty: usize) -> bool {
    check_chain(chain, difficulty).is_ok()
}
