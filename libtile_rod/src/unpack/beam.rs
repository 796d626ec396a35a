use crate::records::BeamElement;

/// Beam-crate sub-fragments: every word is one element, numbered by position
pub fn unpack_beam(frag_id: u16, payload: &[u32]) -> Vec<BeamElement> {
    payload
        .iter()
        .enumerate()
        .map(|(channel, value)| BeamElement {
            frag_id,
            channel,
            value: *value,
        })
        .collect()
}
