//! Splits the ordered slide list into bounded-size sections.

use crate::{Error, Result};

/// Partition `items` into contiguous sections of at most `max_per_section`.
///
/// The last section may be smaller. Zero is a configuration error.
pub fn split_into_sections<T>(items: &[T], max_per_section: usize) -> Result<Vec<&[T]>> {
    if max_per_section == 0 {
        return Err(Error::InvalidConfig(
            "max_slides_per_section must be positive".to_string(),
        ));
    }
    Ok(items.chunks(max_per_section).collect())
}

/// Number of sections `count` items split into.
pub fn section_count(count: usize, max_per_section: usize) -> usize {
    if max_per_section == 0 {
        return 0;
    }
    count.div_ceil(max_per_section)
}
