//! Work partitioning for multi-reader renders
//!
//! The asset is cut into blocks of a whole number of windows. Each reader gets
//! a contiguous run of blocks; the last reader also takes whatever is left
//! when the blocks don't divide evenly. Every block reduces to at most
//! `nominal_outputs_per_block` frames, so block `b` lands at output offset
//! `b * nominal_outputs_per_block`.

/// One reader's share of the asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockDescriptor {
    pub start_block: usize,
    pub num_blocks: usize,
    pub block_size_frames: usize,
    pub output_offset: usize,
}

impl BlockDescriptor {
    /// First input frame of this reader
    pub fn start_frame(&self) -> u64 {
        self.start_block as u64 * self.block_size_frames as u64
    }
}

/// Blocks and reader assignments for one render
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartitionPlan {
    pub block_size_frames: usize,
    pub nominal_outputs_per_block: usize,
    pub total_blocks: usize,
    pub readers: Vec<BlockDescriptor>,
}

/// Block size rounded down to whole windows, never below one window
pub(crate) fn effective_block_size(block_size_frames: usize, ds_factor: usize) -> usize {
    let ds_factor = ds_factor.max(1);
    (block_size_frames - block_size_frames % ds_factor).max(ds_factor)
}

/// Split `total_frames` across up to `num_readers` readers
///
/// Readers that would get no block are dropped; at least one reader remains
/// for any non-empty asset.
pub(crate) fn plan(total_frames: u64, ds_factor: usize, block_size_frames: usize, num_readers: usize) -> PartitionPlan {
    let block = effective_block_size(block_size_frames, ds_factor);
    let block_u64 = block as u64;
    let total_blocks = total_frames.div_ceil(block_u64) as usize;
    let nominal_outputs_per_block = block / ds_factor.max(1);

    let mut num_readers = num_readers.max(1);
    let mut blocks_per_reader = ((total_frames / num_readers as u64) / block_u64) as usize;
    if blocks_per_reader == 0 {
        num_readers = 1;
        blocks_per_reader = total_blocks;
    }

    let readers = if total_blocks == 0 {
        Vec::new()
    } else {
        (0..num_readers)
            .map(|r| {
                let start_block = r * blocks_per_reader;
                let num_blocks = if r + 1 == num_readers {
                    total_blocks - start_block
                } else {
                    blocks_per_reader
                };
                BlockDescriptor {
                    start_block,
                    num_blocks,
                    block_size_frames: block,
                    output_offset: start_block * nominal_outputs_per_block,
                }
            })
            .collect()
    };

    PartitionPlan {
        block_size_frames: block,
        nominal_outputs_per_block,
        total_blocks,
        readers,
    }
}
