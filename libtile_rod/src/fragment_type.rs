use super::constants::*;

/// The closed set of sub-fragment type codes, keyed by the full type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubFragmentType {
    Digits,
    SparseDigits,
    RawChannels,
    SparseRawChannels,
    DspRawChannels,
    Compressed,
    ExtendedDigits,
    DataQuality,
    L2(L2Content),
    Laser,
    Laser2,
    TmdbDigits,
    TmdbRawChannels,
    TmdbDecisions,
    Unknown(u8),
}

/// What an L2 summary sub-fragment carries and for how many modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct L2Content {
    pub muon_tags: bool,
    pub transverse_energy: bool,
    pub modules: usize,
}

impl SubFragmentType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x0 => Self::Digits,
            0x1 => Self::SparseDigits,
            0x2 => Self::RawChannels,
            0x3 => Self::SparseRawChannels,
            0x4 => Self::DspRawChannels,
            0x5 => Self::Compressed,
            0x6 => Self::ExtendedDigits,
            0xA => Self::DataQuality,
            0x10..=0x15 => {
                let n = code - 0x10;
                Self::L2(L2Content {
                    muon_tags: n < 4,
                    transverse_energy: n < 2 || n >= 4,
                    modules: if n % 2 == 0 { 2 } else { 1 },
                })
            }
            0x16 => Self::Laser,
            0x17 => Self::Laser2,
            0x40 => Self::TmdbDigits,
            0x41 => Self::TmdbRawChannels,
            0x42 => Self::TmdbDecisions,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Digits => 0x0,
            Self::SparseDigits => 0x1,
            Self::RawChannels => 0x2,
            Self::SparseRawChannels => 0x3,
            Self::DspRawChannels => 0x4,
            Self::Compressed => 0x5,
            Self::ExtendedDigits => 0x6,
            Self::DataQuality => 0xA,
            Self::L2(c) => {
                let base = match (c.muon_tags, c.transverse_energy) {
                    (true, true) => 0x10,
                    (true, false) => 0x12,
                    _ => 0x14,
                };
                if c.modules == 1 {
                    base + 1
                } else {
                    base
                }
            }
            Self::Laser => 0x16,
            Self::Laser2 => 0x17,
            Self::TmdbDigits => 0x40,
            Self::TmdbRawChannels => 0x41,
            Self::TmdbDecisions => 0x42,
            Self::Unknown(code) => *code,
        }
    }

    /// Types which carry digitized samples
    pub fn has_digits(&self) -> bool {
        matches!(
            self,
            Self::Digits | Self::SparseDigits | Self::Compressed | Self::ExtendedDigits
        )
    }

    /// Types which carry reconstructed channels
    pub fn has_raw_channels(&self) -> bool {
        matches!(
            self,
            Self::RawChannels | Self::SparseRawChannels | Self::DspRawChannels | Self::Compressed
        )
    }
}

/// Units of a reconstructed amplitude. Codes 0-3 are offline, 4-7 online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RawChannelUnit {
    #[default]
    AdcCounts = 0,
    PicoCoulombs = 1,
    CesiumPicoCoulombs = 2,
    MegaElectronVolts = 3,
    OnlineAdcCounts = 4,
    OnlinePicoCoulombs = 5,
    OnlineCesiumPicoCoulombs = 6,
    OnlineMegaElectronVolts = 7,
}

impl RawChannelUnit {
    pub const ONLINE_OFFSET: u32 = 4;

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::AdcCounts),
            1 => Some(Self::PicoCoulombs),
            2 => Some(Self::CesiumPicoCoulombs),
            3 => Some(Self::MegaElectronVolts),
            4 => Some(Self::OnlineAdcCounts),
            5 => Some(Self::OnlinePicoCoulombs),
            6 => Some(Self::OnlineCesiumPicoCoulombs),
            7 => Some(Self::OnlineMegaElectronVolts),
            _ => None,
        }
    }

    /// The online flavour of a 2-bit unit code
    pub fn online(code: u32) -> Option<Self> {
        if code >= Self::ONLINE_OFFSET {
            return None;
        }
        Self::from_code(code + Self::ONLINE_OFFSET)
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn is_online(&self) -> bool {
        self.code() >= Self::ONLINE_OFFSET
    }

    /// The 2-bit code as written in the sub-fragment flags
    pub fn base_code(&self) -> usize {
        (self.code() % Self::ONLINE_OFFSET) as usize
    }
}

/// How the reconstructed channels of a collection were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ReconstructionMethod {
    #[default]
    Digitizer = 0,
    OptFilterOffline = 1,
    OptFilterDsp = 2,
    OptFilterDspCompressed = 3,
    ManyAmps = 4,
    MatchedFilter = 5,
    FitFilter = 6,
    FitFilterCool = 7,
}

impl ReconstructionMethod {
    /// Map the 3-bit algorithm code of simulated data
    pub fn from_algorithm(code: u32) -> Self {
        match code & ALGORITHM_MASK {
            0 => Self::Digitizer,
            1 => Self::OptFilterOffline,
            2 => Self::OptFilterDsp,
            3 => Self::OptFilterDspCompressed,
            4 => Self::ManyAmps,
            5 => Self::MatchedFilter,
            6 => Self::FitFilter,
            _ => Self::FitFilterCool,
        }
    }
}

/// SubFragmentHeader is the decoded id+type word of one sub-fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubFragmentHeader {
    pub frag_id: u16,
    pub type_code: u8,
    pub frag_type: SubFragmentType,
    pub word: u32,
}

impl SubFragmentHeader {
    /// Decode the id+type word. Beam fragments use the narrower 8-bit id field.
    pub fn new(word: u32, beam: bool) -> Self {
        let mask = if beam { BEAM_FRAG_ID_MASK } else { FRAG_ID_MASK };
        let type_code = ((word >> TYPE_SHIFT) & TYPE_MASK) as u8;
        Self {
            frag_id: (word & mask) as u16,
            type_code,
            frag_type: SubFragmentType::from_code(type_code),
            word,
        }
    }

    /// The type code with the low digit ignored (0x10 and 0x1F are the same class)
    pub fn type_class(&self) -> u8 {
        self.type_code & TYPE_CLASS_MASK as u8
    }

    /// All flag bits above the frag id
    pub fn bsflags(&self) -> u32 {
        self.word & FLAGS_MASK
    }

    pub fn unit_code(&self) -> u32 {
        (self.word >> UNIT_SHIFT) & UNIT_MASK
    }

    pub fn data_type(&self) -> u32 {
        (self.word >> DATA_TYPE_SHIFT) & DATA_TYPE_MASK
    }

    pub fn is_simulated(&self) -> bool {
        self.data_type() == DATA_TYPE_SIMULATED
    }

    pub fn algorithm(&self) -> u32 {
        (self.word >> ALGORITHM_SHIFT) & ALGORITHM_MASK
    }

    pub fn calibration_marker(&self) -> bool {
        (self.word >> CALIB_MARKER_SHIFT) & 1 == 1
    }

    /// Unit and method of the reconstructed channels. Real data is in online units and
    /// reconstructed in the DSP; simulated data declares offline units and its algorithm.
    pub fn unit_and_method(&self) -> (RawChannelUnit, ReconstructionMethod) {
        let code = self.unit_code();
        if self.frag_type == SubFragmentType::Compressed {
            return (
                RawChannelUnit::online(code).unwrap_or_default(),
                ReconstructionMethod::OptFilterDspCompressed,
            );
        }
        if self.is_simulated() {
            (
                RawChannelUnit::from_code(code).unwrap_or_default(),
                ReconstructionMethod::from_algorithm(self.algorithm()),
            )
        } else {
            (
                RawChannelUnit::online(code).unwrap_or_default(),
                ReconstructionMethod::OptFilterDsp,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_type_codes() {
        for code in [0x0, 0x1, 0x2, 0x3, 0x4, 0x5, 0x6, 0xA, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x40, 0x41, 0x42] {
            let t = SubFragmentType::from_code(code);
            assert!(!matches!(t, SubFragmentType::Unknown(_)), "{code:#x}");
            assert_eq!(t.code(), code);
        }
        assert_eq!(SubFragmentType::from_code(0x7), SubFragmentType::Unknown(0x7));
        assert_eq!(
            SubFragmentType::from_code(0x13),
            SubFragmentType::L2(L2Content {
                muon_tags: true,
                transverse_energy: false,
                modules: 1
            })
        );
    }

    #[test]
    fn test_flags() {
        // unit 2, simulated, calib marker, algorithm 4, type 4, frag 0x213
        let word = (2 << 30) | (3 << 28) | (1 << 27) | (4 << 24) | (0x4 << 16) | 0x213;
        let header = SubFragmentHeader::new(word, false);
        assert_eq!(header.frag_id, 0x213);
        assert_eq!(header.frag_type, SubFragmentType::DspRawChannels);
        assert!(header.is_simulated());
        assert!(header.calibration_marker());
        assert_eq!(header.bsflags(), word & 0xFFFF_0000);
        assert_eq!(
            header.unit_and_method(),
            (RawChannelUnit::CesiumPicoCoulombs, ReconstructionMethod::ManyAmps)
        );

        let real = SubFragmentHeader::new((3 << 30) | (0x4 << 16) | 0x213, false);
        assert_eq!(
            real.unit_and_method(),
            (RawChannelUnit::OnlineMegaElectronVolts, ReconstructionMethod::OptFilterDsp)
        );
    }

    #[test]
    fn test_beam_id_mask() {
        let header = SubFragmentHeader::new(0x0001_041F, true);
        assert_eq!(header.frag_id, 0x1F);
        let header = SubFragmentHeader::new(0x0001_041F, false);
        assert_eq!(header.frag_id, 0x041F);
    }

    #[test]
    fn test_units() {
        assert_eq!(RawChannelUnit::online(1), Some(RawChannelUnit::OnlinePicoCoulombs));
        assert_eq!(RawChannelUnit::online(4), None);
        assert!(RawChannelUnit::OnlineAdcCounts.is_online());
        assert!(!RawChannelUnit::MegaElectronVolts.is_online());
        assert_eq!(RawChannelUnit::OnlineMegaElectronVolts.base_code(), 3);
    }

    proptest! {
        #[test]
        fn prop_type_class_ignores_low_digit(class in 0u32..16, low in 0u32..16, rest in any::<u16>()) {
            let a = SubFragmentHeader::new((class << 20) | rest as u32, false);
            let b = SubFragmentHeader::new((class << 20) | (low << 16) | rest as u32, false);
            prop_assert_eq!(a.type_class(), b.type_class());
        }
    }
}
