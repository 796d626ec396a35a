use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use super::cabling::CablingDescription;
use super::constants::*;
use super::hardware_id::{drawer, frag_id, is_beam_frag, ros, DrawerFormat, DrawerKind, DrawerMode};

/// The address spaces which number their fragments independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// Calorimeter drawers (and the beam crate in ROS 0)
    Main,
    Laser,
    /// Muon receiver boards
    Tmdb,
}

/// Options which change how the map is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityOptions {
    /// From this run on each ROD serves 4 drawers, before it 8 drawers on every second ROD
    pub full_tile_mode_run: u32,
    /// Drawers read out by demonstrator electronics regardless of the cabling description
    pub demonstrator_frag_ids: Vec<u16>,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self {
            full_tile_mode_run: DEFAULT_FULL_TILE_MODE_RUN,
            demonstrator_frag_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityMapEntry {
    pub frag_id: u16,
    /// Id written in the sub-fragment header, usually equal to frag_id
    pub bs_frag_id: u16,
    pub rod_source_id: u32,
    pub rob_source_id: u32,
    pub format: DrawerFormat,
    pub first_run: u32,
    pub last_run: u32,
}

/// IdentityMap translates between logical frag ids, ROD/ROB source ids and partitions for one run.
///
/// It is immutable once built; a run transition builds a new one (see `RoutingTable`).
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    run: u32,
    full_tile_mode: bool,
    main: FxHashMap<u16, IdentityMapEntry>,
    main_by_bs: FxHashMap<u16, u16>,
    tmdb: FxHashMap<u16, IdentityMapEntry>,
    laser: FxHashMap<u16, IdentityMapEntry>,
    frags_by_rob: FxHashMap<u32, Vec<u16>>,
}

impl IdentityMap {
    pub fn new(run: u32, cabling: &CablingDescription, options: &IdentityOptions) -> Self {
        let full_tile_mode = run >= options.full_tile_mode_run;
        let mut map = Self {
            run,
            full_tile_mode,
            ..Default::default()
        };

        for r in 1..=MAX_ROS {
            for d in 0..DRAWERS_PER_PARTITION as u16 {
                let frag = frag_id(r, d);
                let rod = main_rod_id(frag, full_tile_mode);
                map.insert_main(IdentityMapEntry {
                    frag_id: frag,
                    bs_frag_id: frag,
                    rod_source_id: rod,
                    rob_source_id: rod_to_rob(rod),
                    format: DrawerFormat::nominal(frag),
                    first_run: 0,
                    last_run: u32::MAX,
                });
            }
            for board in 0..(DRAWERS_PER_PARTITION as u16 / DRAWERS_PER_TMDB_BOARD) {
                let rod = tmdb_rod_id(r, board);
                let bs = frag_id(r, board);
                map.tmdb.insert(
                    bs,
                    IdentityMapEntry {
                        frag_id: frag_id(r, board * DRAWERS_PER_TMDB_BOARD),
                        bs_frag_id: bs,
                        rod_source_id: rod,
                        rob_source_id: rod_to_rob(rod),
                        format: DrawerFormat::nominal(frag_id(r, 0)),
                        first_run: 0,
                        last_run: u32::MAX,
                    },
                );
            }
        }

        for frag in LASER_FRAG_IDS {
            map.laser.insert(
                frag,
                IdentityMapEntry {
                    frag_id: frag,
                    bs_frag_id: frag,
                    rod_source_id: LASER_ROD_ID,
                    rob_source_id: rod_to_rob(LASER_ROD_ID),
                    format: DrawerFormat::new(DrawerKind::Beam, DrawerMode::Normal),
                    first_run: 0,
                    last_run: u32::MAX,
                },
            );
        }

        for row in cabling.active(run) {
            let rod = main_rod_id(row.frag_id, full_tile_mode);
            map.insert_main(IdentityMapEntry {
                frag_id: row.frag_id,
                bs_frag_id: row.bs_frag_id,
                rod_source_id: rod,
                rob_source_id: rod_to_rob(rod),
                format: DrawerFormat::new(row.kind, row.mode),
                first_run: row.first_run,
                last_run: row.last_run,
            });
        }

        for frag in options.demonstrator_frag_ids.iter() {
            if let Some(entry) = map.main.get_mut(frag) {
                entry.format.kind = entry.format.kind.as_demonstrator();
            }
        }

        for list in map.frags_by_rob.values_mut() {
            list.sort_unstable();
        }

        spdlog::debug!(
            "Built identity map for run {} with {} drawers ({} mode)",
            run,
            map.main.len(),
            if full_tile_mode { "full" } else { "staging" }
        );
        map
    }

    fn insert_main(&mut self, entry: IdentityMapEntry) {
        if let Some(old) = self.main.insert(entry.frag_id, entry) {
            self.main_by_bs.remove(&old.bs_frag_id);
            if let Some(list) = self.frags_by_rob.get_mut(&old.rob_source_id) {
                list.retain(|f| *f != old.frag_id);
            }
        }
        self.main_by_bs.insert(entry.bs_frag_id, entry.frag_id);
        self.frags_by_rob
            .entry(entry.rob_source_id)
            .or_default()
            .push(entry.frag_id);
    }

    pub fn run(&self) -> u32 {
        self.run
    }

    pub fn is_full_tile_mode(&self) -> bool {
        self.full_tile_mode
    }

    /// ROD source id serving a logical drawer
    pub fn logical_to_rod(&self, frag_id: u16) -> Option<u32> {
        self.main.get(&frag_id).map(|e| e.rod_source_id)
    }

    /// ROD source id of a fragment in an explicitly named address space
    pub fn source_id(&self, subsystem: Subsystem, frag_id: u16) -> Option<u32> {
        match subsystem {
            Subsystem::Main => self.logical_to_rod(frag_id),
            Subsystem::Laser => self.laser.get(&frag_id).map(|e| e.rod_source_id),
            Subsystem::Tmdb => {
                let board = drawer(frag_id) / DRAWERS_PER_TMDB_BOARD;
                self.tmdb
                    .get(&super::hardware_id::frag_id(ros(frag_id), board))
                    .map(|e| e.rod_source_id)
            }
        }
    }

    /// Logical frag id behind a byte-stream frag id
    pub fn rob_fragment(&self, subsystem: Subsystem, bs_frag_id: u16) -> Option<u16> {
        match subsystem {
            Subsystem::Main => self.main_by_bs.get(&bs_frag_id).copied(),
            Subsystem::Laser => self.laser.get(&bs_frag_id).map(|e| e.frag_id),
            Subsystem::Tmdb => self.tmdb.get(&bs_frag_id).map(|e| e.frag_id),
        }
    }

    pub fn entry(&self, frag_id: u16) -> Option<&IdentityMapEntry> {
        self.main.get(&frag_id)
    }

    pub fn tmdb_entry(&self, bs_frag_id: u16) -> Option<&IdentityMapEntry> {
        self.tmdb.get(&bs_frag_id)
    }

    /// Drawer format of a main-space frag; unknown drawers get the nominal format
    pub fn drawer_format(&self, frag_id: u16) -> DrawerFormat {
        self.main
            .get(&frag_id)
            .map(|e| e.format)
            .unwrap_or_else(|| DrawerFormat::nominal(frag_id))
    }

    /// Byte-stream id to look for inside the ROD of a logical drawer
    pub fn bs_frag_id(&self, frag_id: u16) -> u16 {
        self.main.get(&frag_id).map(|e| e.bs_frag_id).unwrap_or(frag_id)
    }

    /// Every main-space drawer, sorted
    pub fn frag_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.main.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Logical drawers read out through one ROB
    pub fn frags_for_rob(&self, rob_source_id: u32) -> &[u16] {
        self.frags_by_rob
            .get(&rob_source_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Muon receiver boards, sorted by byte-stream id
    pub fn tmdb_boards(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.tmdb.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

fn main_rod_id(frag: u16, full_tile_mode: bool) -> u32 {
    let r = ros(frag) as u32;
    if r == 0 || is_beam_frag(frag) {
        return TILE_DETECTOR_BASE;
    }
    let d = drawer(frag) as u32;
    let slot = if full_tile_mode { d / 4 } else { (d / 8) * 2 };
    TILE_DETECTOR_BASE | (r << 16) | slot
}

fn tmdb_rod_id(r: u16, board: u16) -> u32 {
    TILE_DETECTOR_BASE | ((r as u32) << 16) | TMDB_ROD_OFFSET | board as u32
}

/// Every ROD is read through a ROB of the same id
pub fn rod_to_rob(rod_source_id: u32) -> u32 {
    rod_source_id
}

/// Detector id (0x50 beam, 0x51-0x54 partitions) of a ROB
pub fn rob_to_partition(rob_source_id: u32) -> u8 {
    ((rob_source_id >> 16) & 0xFF) as u8
}

/// RoutingTable hands out the identity map for the current run.
///
/// Readers take a snapshot (an `Arc` clone) and keep using it for a batch of decodes.
/// A run transition builds a new map outside the lock and swaps it in, so in-flight
/// readers never see a partially built map.
#[derive(Debug)]
pub struct RoutingTable {
    current: RwLock<Arc<IdentityMap>>,
    cabling: CablingDescription,
    options: IdentityOptions,
}

impl RoutingTable {
    pub fn new(cabling: CablingDescription, options: IdentityOptions, run: u32) -> Self {
        let map = IdentityMap::new(run, &cabling, &options);
        Self {
            current: RwLock::new(Arc::new(map)),
            cabling,
            options,
        }
    }

    pub fn snapshot(&self) -> Arc<IdentityMap> {
        self.current.read().clone()
    }

    /// The map for `run`, rebuilding it if the current one belongs to another run
    pub fn for_run(&self, run: u32) -> Arc<IdentityMap> {
        let current = self.snapshot();
        if current.run() == run {
            return current;
        }
        let map = Arc::new(IdentityMap::new(run, &self.cabling, &self.options));
        let mut guard = self.current.write();
        if guard.run() != run {
            spdlog::info!("Run changed from {} to {}; swapped identity map", guard.run(), run);
            *guard = map;
        }
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cabling::CablingEntry;
    use std::str::FromStr;

    #[test]
    fn test_main_space_formulas() {
        let cabling = CablingDescription::default();
        let options = IdentityOptions::default();
        let full = IdentityMap::new(400_000, &cabling, &options);
        assert!(full.is_full_tile_mode());
        assert_eq!(full.logical_to_rod(0x10D), Some(0x510003));
        assert_eq!(full.logical_to_rod(0x43F), Some(0x54000F));
        let staging = IdentityMap::new(200_000, &cabling, &options);
        assert_eq!(staging.logical_to_rod(0x10D), Some(0x510002));
        assert_eq!(staging.logical_to_rod(0x43F), Some(0x54000E));
        assert_eq!(full.logical_to_rod(0x500), None);

        assert_eq!(rod_to_rob(0x510003), 0x510003);
        assert_eq!(rob_to_partition(0x540003), 0x54);
        assert_eq!(full.frags_for_rob(0x510003), &[0x10C, 0x10D, 0x10E, 0x10F]);
        assert_eq!(full.frag_ids().len(), 256);
    }

    #[test]
    fn test_subsystems_are_disjoint() {
        let map = IdentityMap::new(400_000, &CablingDescription::default(), &IdentityOptions::default());
        assert_eq!(map.source_id(Subsystem::Laser, 0x17), Some(0x500000));
        assert_eq!(map.source_id(Subsystem::Laser, 0x10D), None);
        assert_eq!(map.source_id(Subsystem::Tmdb, 0x30F), Some(0x530101));
        assert_eq!(map.source_id(Subsystem::Main, 0x30F), Some(0x530003));
        assert_eq!(map.rob_fragment(Subsystem::Tmdb, 0x301), Some(0x308));
        assert_eq!(map.rob_fragment(Subsystem::Laser, 0x16), Some(0x16));
        assert_eq!(map.rob_fragment(Subsystem::Main, 0x30F), Some(0x30F));
        assert_eq!(map.tmdb_boards().len(), 32);
    }

    #[test]
    fn test_cabling_overrides() {
        let text = "frag_id,bs_frag_id,kind,mode,first_run,last_run\n\
                    0x30e,0x30e,special_extended_barrel,normal,0,4294967295\n\
                    0x201,0x2ff,long_barrel,calib,0,4294967295\n\
                    0x010,0x010,beam,normal,0,4294967295\n";
        let cabling = CablingDescription::from_str(text).unwrap();
        let options = IdentityOptions {
            demonstrator_frag_ids: vec![0x105],
            ..Default::default()
        };
        let map = IdentityMap::new(400_000, &cabling, &options);
        assert_eq!(map.drawer_format(0x30E).kind, DrawerKind::SpecialExtendedBarrel);
        assert!(map.drawer_format(0x201).is_calibration());
        assert_eq!(map.bs_frag_id(0x201), 0x2FF);
        assert_eq!(map.rob_fragment(Subsystem::Main, 0x2FF), Some(0x201));
        assert_eq!(map.rob_fragment(Subsystem::Main, 0x201), None);
        assert_eq!(map.drawer_format(0x105).kind, DrawerKind::DemonstratorLongBarrel);
        assert_eq!(map.logical_to_rod(0x10), Some(0x500000));
        assert_eq!(map.entry(0x10).unwrap().format.kind, DrawerKind::Beam);
    }

    #[test]
    fn test_routing_stability_across_runs() {
        let mut cabling = CablingDescription::default();
        cabling
            .push(CablingEntry {
                frag_id: 0x105,
                bs_frag_id: 0x105,
                kind: DrawerKind::LongBarrel,
                mode: DrawerMode::Calibration,
                first_run: 0,
                last_run: 100,
            })
            .unwrap();
        let options = IdentityOptions {
            full_tile_mode_run: 200,
            ..Default::default()
        };
        let table = RoutingTable::new(cabling, options, 50);

        let a = table.snapshot();
        let b = table.for_run(50);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.logical_to_rod(0x105), b.logical_to_rod(0x105));
        assert!(a.drawer_format(0x105).is_calibration());

        let c = table.for_run(300);
        assert_eq!(c.run(), 300);
        assert_ne!(a.logical_to_rod(0x105), c.logical_to_rod(0x105));
        assert!(!c.drawer_format(0x105).is_calibration());
        // the old snapshot is untouched
        assert_eq!(a.run(), 50);
        assert!(Arc::ptr_eq(&table.snapshot(), &c));
    }

    #[test]
    fn test_concurrent_snapshots() {
        let table = Arc::new(RoutingTable::new(
            CablingDescription::default(),
            IdentityOptions::default(),
            1,
        ));
        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let t = table.clone();
                std::thread::spawn(move || {
                    for run in 0..20 {
                        let map = t.for_run(run * 4 + i);
                        assert!(map.logical_to_rod(0x100).is_some());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
