use anyhow::{anyhow, Result};
use noodles::sam;
use noodles::sam::header::record::value::{
    map::{Header as HeaderMap, ReferenceSequence},
    Map,
};
use std::num::NonZeroUsize;

/// Build the output SAM header from the input BAM's reference dictionary.
pub fn build_header(refs: &[(String, usize)]) -> Result<sam::Header> {
    let mut builder = sam::Header::builder().set_header(Map::<HeaderMap>::default());
    for (name, len) in refs {
        let len = NonZeroUsize::new(*len)
            .ok_or_else(|| anyhow!("reference {name} has zero length"))?;
        builder = builder.add_reference_sequence(
            name.as_bytes().to_vec(),
            Map::<ReferenceSequence>::new(len),
        );
    }
    Ok(builder.build())
}
