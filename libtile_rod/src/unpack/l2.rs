use crate::error::UnpackError;
use crate::fragment_type::L2Content;
use crate::records::L2Summary;
use crate::word_stream::WordStream;

const ETA_SCALE: f32 = 1000.0;

/// Types 0x10-0x15: per module an optional muon list `[n][n tags]` and an optional
/// transverse energy word. The second module belongs to the next drawer.
pub fn unpack_l2(frag_id: u16, content: L2Content, payload: &[u32]) -> Result<Vec<L2Summary>, UnpackError> {
    let mut stream = WordStream::new(payload);
    let mut summaries = Vec::with_capacity(content.modules);
    for module in 0..content.modules {
        let mut summary = L2Summary {
            frag_id: frag_id.wrapping_add(module as u16),
            ..Default::default()
        };
        if content.muon_tags {
            let n_muons = stream.read()? as usize;
            for tag in stream.take(n_muons)? {
                summary.muon_eta.push((tag & 0xFFFF) as u16 as i16 as f32 / ETA_SCALE);
                summary.muon_energy.push(((tag >> 16) & 0x7FFF) as f32);
                summary.muon_quality.push((tag >> 31) as u8);
            }
        }
        if content.transverse_energy {
            summary.transverse_energy = Some(stream.read()? as i32 as f32);
        }
        summaries.push(summary);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment_type::SubFragmentType;

    fn content(code: u8) -> L2Content {
        match SubFragmentType::from_code(code) {
            SubFragmentType::L2(c) => c,
            other => panic!("{other:?} is not an L2 type"),
        }
    }

    fn tag(eta: i16, energy: u32, quality: u32) -> u32 {
        (quality << 31) | ((energy & 0x7FFF) << 16) | eta as u16 as u32
    }

    #[test]
    fn test_two_modules_with_energy() {
        let payload = [2, tag(-350, 1200, 1), tag(800, 700, 0), (-2500i32) as u32, 0, 4000];
        let out = unpack_l2(0x20A, content(0x10), &payload).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].frag_id, 0x20A);
        assert_eq!(out[0].muon_eta, vec![-0.35, 0.8]);
        assert_eq!(out[0].muon_energy, vec![1200.0, 700.0]);
        assert_eq!(out[0].muon_quality, vec![1, 0]);
        assert_eq!(out[0].transverse_energy, Some(-2500.0));
        assert_eq!(out[1].frag_id, 0x20B);
        assert!(out[1].muon_eta.is_empty());
        assert_eq!(out[1].transverse_energy, Some(4000.0));
    }

    #[test]
    fn test_single_content_kinds() {
        let out = unpack_l2(0x101, content(0x13), &[1, tag(10, 5, 0)]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].transverse_energy, None);
        assert_eq!(out[0].muon_energy, vec![5.0]);

        let out = unpack_l2(0x101, content(0x14), &[7, 9]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].transverse_energy, Some(9.0));
    }

    #[test]
    fn test_second_module_id_wraps() {
        let out = unpack_l2(0xFFFF, content(0x10), &[0, 0, 0, 0]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].frag_id, 0xFFFF);
        assert_eq!(out[1].frag_id, 0x0000);
        assert_eq!(out[1].transverse_energy, Some(0.0));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(
            unpack_l2(0x101, content(0x11), &[3, tag(10, 5, 0)]),
            Err(UnpackError::Truncated(_))
        ));
        assert!(unpack_l2(0x101, content(0x15), &[]).is_err());
    }
}
