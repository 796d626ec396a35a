use super::constants::{BEAM_FRAG_LIMIT, DRAWERS_PER_PARTITION, MAX_DRAWER_ROS0};
use super::error::DrawerError;
use std::fmt;
use std::str::FromStr;

/// Readout partitions (ROS). Beam/laser electronics sit in ROS 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Beam = 0,
    LongBarrelA = 1,
    LongBarrelC = 2,
    ExtendedBarrelA = 3,
    ExtendedBarrelC = 4,
}

impl Partition {
    pub fn from_ros(ros: u16) -> Option<Self> {
        match ros {
            0 => Some(Self::Beam),
            1 => Some(Self::LongBarrelA),
            2 => Some(Self::LongBarrelC),
            3 => Some(Self::ExtendedBarrelA),
            4 => Some(Self::ExtendedBarrelC),
            _ => None,
        }
    }

    pub fn ros(&self) -> u16 {
        *self as u16
    }

    pub fn is_extended_barrel(&self) -> bool {
        matches!(self, Self::ExtendedBarrelA | Self::ExtendedBarrelC)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Beam => "BEAM",
            Self::LongBarrelA => "LBA",
            Self::LongBarrelC => "LBC",
            Self::ExtendedBarrelA => "EBA",
            Self::ExtendedBarrelC => "EBC",
        }
    }
}

/// The electronics flavour of a drawer, which selects channel-order tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawerKind {
    LongBarrel,
    ExtendedBarrel,
    /// EBA15 and EBC18, which have the D4 cell cabled differently
    SpecialExtendedBarrel,
    DemonstratorLongBarrel,
    DemonstratorExtendedBarrel,
    Beam,
}

impl DrawerKind {
    /// The nominal kind of a drawer from its frag id alone
    pub fn nominal(frag_id: u16) -> Self {
        match Partition::from_ros(ros(frag_id)) {
            Some(Partition::Beam) | None => Self::Beam,
            Some(Partition::LongBarrelA) | Some(Partition::LongBarrelC) => Self::LongBarrel,
            Some(_) => Self::ExtendedBarrel,
        }
    }

    pub fn is_demonstrator(&self) -> bool {
        matches!(
            self,
            Self::DemonstratorLongBarrel | Self::DemonstratorExtendedBarrel
        )
    }

    /// The demonstrator flavour of this kind (used for drawers listed in the config)
    pub fn as_demonstrator(&self) -> Self {
        match self {
            Self::LongBarrel => Self::DemonstratorLongBarrel,
            Self::ExtendedBarrel | Self::SpecialExtendedBarrel => Self::DemonstratorExtendedBarrel,
            other => *other,
        }
    }
}

impl FromStr for DrawerKind {
    type Err = DrawerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long_barrel" => Ok(Self::LongBarrel),
            "extended_barrel" => Ok(Self::ExtendedBarrel),
            "special_extended_barrel" => Ok(Self::SpecialExtendedBarrel),
            "demo_long_barrel" => Ok(Self::DemonstratorLongBarrel),
            "demo_extended_barrel" => Ok(Self::DemonstratorExtendedBarrel),
            "beam" => Ok(Self::Beam),
            _ => Err(DrawerError::InvalidKind(s.to_string())),
        }
    }
}

/// Acquisition mode of a drawer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawerMode {
    #[default]
    Normal,
    /// Both gains recorded for every channel
    Calibration,
}

impl FromStr for DrawerMode {
    type Err = DrawerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "calib" => Ok(Self::Calibration),
            _ => Err(DrawerError::InvalidMode(s.to_string())),
        }
    }
}

/// DrawerFormat is the drawer-format tag handed to every unpacker.
///
/// Calibration mode is taken from here, never guessed from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawerFormat {
    pub kind: DrawerKind,
    pub mode: DrawerMode,
}

impl DrawerFormat {
    pub fn new(kind: DrawerKind, mode: DrawerMode) -> Self {
        Self { kind, mode }
    }

    pub fn nominal(frag_id: u16) -> Self {
        Self::new(DrawerKind::nominal(frag_id), DrawerMode::Normal)
    }

    pub fn is_calibration(&self) -> bool {
        self.mode == DrawerMode::Calibration
    }

    /// Number of gain sets present in the data (1 normally, 2 in calibration mode)
    pub fn gain_sets(&self) -> usize {
        if self.is_calibration() {
            2
        } else {
            1
        }
    }
}

/// Compose a logical fragment id from partition and drawer number
pub fn frag_id(ros: u16, drawer: u16) -> u16 {
    (ros << 8) | (drawer & 0xFF)
}

pub fn ros(frag_id: u16) -> u16 {
    frag_id >> 8
}

pub fn drawer(frag_id: u16) -> u16 {
    frag_id & 0xFF
}

pub fn is_beam_frag(frag_id: u16) -> bool {
    frag_id < BEAM_FRAG_LIMIT
}

/// Generate the conditions-database drawer index for a logical fragment id
pub fn drawer_idx(frag_id: u16) -> usize {
    let (ros, drawer) = (ros(frag_id) as usize, drawer(frag_id) as usize);
    if ros == 0 {
        drawer
    } else {
        MAX_DRAWER_ROS0 + (ros - 1) * DRAWERS_PER_PARTITION + drawer
    }
}

/// Printable wrapper, e.g. `LBA14` for frag 0x10D
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawerName(pub u16);

impl fmt::Display for DrawerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Partition::from_ros(ros(self.0)) {
            Some(Partition::Beam) | None => write!(f, "0x{:03x}", self.0),
            Some(p) => write!(f, "{}{:02}", p.name(), drawer(self.0) + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frag_id_formula() {
        assert_eq!(frag_id(3, 14), 0x30E);
        assert_eq!(ros(0x411), 4);
        assert_eq!(drawer(0x411), 0x11);
        assert!(is_beam_frag(0x1F));
        assert!(!is_beam_frag(0x100));
    }

    #[test]
    fn test_drawer_idx() {
        assert_eq!(drawer_idx(0x005), 5);
        assert_eq!(drawer_idx(0x100), 20);
        assert_eq!(drawer_idx(0x43F), 20 + 3 * 64 + 63);
    }

    #[test]
    fn test_names_and_kinds() {
        assert_eq!(DrawerName(0x30E).to_string(), "EBA15");
        assert_eq!(DrawerName(0x411).to_string(), "EBC18");
        assert_eq!(DrawerKind::nominal(0x203), DrawerKind::LongBarrel);
        assert_eq!(DrawerKind::nominal(0x401), DrawerKind::ExtendedBarrel);
        assert_eq!(
            DrawerKind::from_str("demo_long_barrel").unwrap(),
            DrawerKind::DemonstratorLongBarrel
        );
        assert!(DrawerKind::from_str("pad").is_err());
        assert_eq!(DrawerMode::from_str("calib").unwrap(), DrawerMode::Calibration);
        assert_eq!(
            DrawerFormat::new(DrawerKind::LongBarrel, DrawerMode::Calibration).gain_sets(),
            2
        );
    }
}
