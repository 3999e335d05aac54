//! Sample record generation.

use iio_core::SampleLayout;

use crate::common::MockRng;
use crate::config::SamplePattern;

/// Fill `dst` with whole sample records laid out per `layout`.
///
/// `counter` is the index of the first record and is advanced past the last one
/// written. Returns the number of bytes written.
pub fn fill_records(
    layout: &SampleLayout<'_>,
    dst: &mut [u8],
    pattern: SamplePattern,
    constant: i64,
    counter: &mut u64,
    rng: &MockRng,
) -> usize {
    let record_size = layout.record_size();
    let records = layout.records_in(dst.len());

    for record in dst[..records * record_size].chunks_exact_mut(record_size) {
        for channel in layout.channels() {
            let Some(offset) = layout.offset_of(channel) else {
                continue;
            };
            let format = channel.format();
            let width = format.storage_bytes();
            for repeat in 0..format.repeat as usize {
                let value = match pattern {
                    SamplePattern::Ramp => {
                        (*counter as i64).wrapping_add((channel.index() + repeat) as i64)
                    }
                    SamplePattern::Constant => constant,
                    SamplePattern::Noise => rng.next_u64() as i64,
                };
                let start = offset + repeat * width;
                format.insert(value, &mut record[start..start + width]);
            }
        }
        *counter += 1;
    }

    records * record_size
}
