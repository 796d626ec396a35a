use crate::error::UnpackError;
use crate::fragment_type::SubFragmentType;
use crate::records::LaserRecord;

const LASER_MIN_WORDS: usize = 7;
const LASER_FIXED_WORDS: usize = 5;
const LASER_I_DIODES: usize = 4;

fn halves(word: u32) -> [u32; 2] {
    [word & 0xFFFF, word >> 16]
}

/// Types 0x16 (laser I) and 0x17 (laser II)
pub fn unpack_laser(frag_type: SubFragmentType, payload: &[u32]) -> Result<LaserRecord, UnpackError> {
    if payload.len() < LASER_MIN_WORDS {
        return Err(UnpackError::TooShort {
            words: payload.len(),
            min: LASER_MIN_WORDS,
        });
    }
    let (version, n_diodes) = match frag_type {
        SubFragmentType::Laser => (-1, LASER_I_DIODES),
        SubFragmentType::Laser2 => (-2, 2 * (payload.len() - LASER_FIXED_WORDS)),
        other => return Err(UnpackError::UnknownType(other.code())),
    };
    let [measured_intensity, daq_type] = halves(payload[2]);
    let diodes = payload[LASER_FIXED_WORDS..]
        .iter()
        .flat_map(|w| halves(*w))
        .take(n_diodes)
        .collect();
    Ok(LaserRecord {
        version,
        counter: payload[0],
        filter: payload[1] & 0xF,
        shutter: (payload[1] >> 8) & 1 == 1,
        requested_intensity: payload[1] >> 16,
        measured_intensity,
        daq_type,
        pmt_adc: halves(payload[3]),
        tdc: halves(payload[4]),
        diodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_laser_one() {
        let payload = [77, (900 << 16) | (1 << 8) | 5, (3 << 16) | 850, (20 << 16) | 10, (40 << 16) | 30, (2 << 16) | 1, (4 << 16) | 3, 0xDEAD];
        let rec = unpack_laser(SubFragmentType::Laser, &payload).unwrap();
        assert_eq!(rec.version, -1);
        assert_eq!(rec.counter, 77);
        assert_eq!(rec.filter, 5);
        assert!(rec.shutter);
        assert_eq!(rec.requested_intensity, 900);
        assert_eq!((rec.measured_intensity, rec.daq_type), (850, 3));
        assert_eq!(rec.pmt_adc, [10, 20]);
        assert_eq!(rec.tdc, [30, 40]);
        assert_eq!(rec.diodes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_laser_two_diode_count() {
        let mut payload = vec![1, 0, 0, 0, 0];
        payload.extend((0..6).map(|i| (2 * i + 1) << 16 | 2 * i));
        let rec = unpack_laser(SubFragmentType::Laser2, &payload).unwrap();
        assert_eq!(rec.version, -2);
        assert!(!rec.shutter);
        assert_eq!(rec.diodes, (0..12).collect::<Vec<u32>>());
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            unpack_laser(SubFragmentType::Laser, &[0; 6]),
            Err(UnpackError::TooShort { words: 6, min: 7 })
        ));
    }
}
