use std::collections::BTreeSet;
use std::sync::Arc;

use super::channel_order::ChannelOrderTables;
use super::collection::{CollectionBuilder, DrawerCollection, DrawerContainer};
use super::config::DecoderOptions;
use super::constants::{LASER_FRAG_IDS, LASER_ROD_ID};
use super::diagnostics::Diagnostics;
use super::error::{ChannelOrderError, UnpackError};
use super::fragment_type::{SubFragmentHeader, SubFragmentType};
use super::hardware_id::{DrawerFormat, DrawerMode, DrawerName};
use super::identity_map::{rob_to_partition, rod_to_rob, IdentityMap, Subsystem};
use super::metadata::FragmentStatus;
use super::online_weights::OnlineWeightCache;
use super::records::{BeamElement, L2Summary, LaserRecord, TmdbDecision, TmdbDigits, TmdbRawChannel};
use super::rod_fragment::{RawEvent, RobFragment, RodFragment};
use super::scanner::{SubFragment, SubFragmentScanner};
use super::unpack::{self, UnpackContext};

/// Everything decoded from one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedEvent {
    pub run_number: u32,
    pub drawers: DrawerContainer,
    pub l2: Vec<L2Summary>,
    pub laser: Option<LaserRecord>,
    pub beam: Vec<BeamElement>,
    pub tmdb_digits: Vec<TmdbDigits>,
    pub tmdb_raw_channels: Vec<TmdbRawChannel>,
    pub tmdb_decisions: Vec<TmdbDecision>,
}

/// RodDecoder turns ROD fragments into per-drawer collections.
///
/// It holds only read-only state after construction (the channel-order tables, the decoder
/// options) plus the write-once weight cache and the shared diagnostics counters, so one
/// decoder can be shared by every worker thread.
#[derive(Debug)]
pub struct RodDecoder {
    options: DecoderOptions,
    diag: Arc<Diagnostics>,
    tables: ChannelOrderTables,
    weights: OnlineWeightCache,
}

impl RodDecoder {
    pub fn new(options: DecoderOptions) -> Result<Self, ChannelOrderError> {
        let diag = Arc::new(options.diagnostics());
        Ok(Self {
            options,
            diag,
            tables: ChannelOrderTables::new()?,
            weights: OnlineWeightCache::default(),
        })
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diag
    }

    pub fn weights(&self) -> &OnlineWeightCache {
        &self.weights
    }

    fn drawer_format(&self, map: &IdentityMap, frag_id: u16) -> DrawerFormat {
        let mut format = map.drawer_format(frag_id);
        if self.options.force_calibration_mode {
            format.mode = DrawerMode::Calibration;
        }
        format
    }

    /// Whether the options ask for this type at all
    fn wants(&self, frag_type: SubFragmentType) -> bool {
        match frag_type {
            SubFragmentType::Digits | SubFragmentType::ExtendedDigits => self.options.use_frag0,
            SubFragmentType::SparseDigits => self.options.use_frag1,
            SubFragmentType::RawChannels
            | SubFragmentType::SparseRawChannels
            | SubFragmentType::DspRawChannels => self.options.use_frag4,
            SubFragmentType::Compressed => self.options.use_frag5_raw || self.options.use_frag5_reco,
            _ => true,
        }
    }

    fn scanner<'a>(&'a self, rod: &RodFragment<'a>) -> SubFragmentScanner<'a> {
        SubFragmentScanner::new(rod.data(), rod.header.version, rod.header.source_id, &self.diag)
    }

    fn parse_rod<'a>(&self, rob: &RobFragment<'a>) -> Option<RodFragment<'a>> {
        match rob.rod(&self.diag) {
            Ok(rod) => Some(rod),
            Err(e) => {
                if self.diag.error() {
                    spdlog::error!("Could not parse the ROD in ROB {:#x}: {}", rob.source_id, e);
                }
                None
            }
        }
    }

    fn log_dropped(&self, frag_id: u16, header: &SubFragmentHeader, e: &UnpackError) {
        if self.diag.error() {
            spdlog::error!(
                "Dropped sub-fragment type {:#x} of {}: {}",
                header.type_code,
                DrawerName(frag_id),
                e
            );
        }
    }

    /// A drawer whose ROB is not in the event
    fn missing_rob(&self, map: &IdentityMap, frag_id: u16) -> DrawerCollection {
        let mut collection = CollectionBuilder::new(frag_id, self.drawer_format(map, frag_id)).finish(None, 0);
        collection.metadata.status = FragmentStatus::NO_ROB;
        collection
    }

    /// Decode the drawers `frag_ids` out of one ROD in a single scan. Every requested drawer
    /// gets a collection, with `NoFragment` when the ROD does not contain it.
    pub fn decode_drawers(&self, rod: &RodFragment, frag_ids: &[u16], map: &IdentityMap) -> Vec<DrawerCollection> {
        let mut builders: Vec<(u16, CollectionBuilder)> = frag_ids
            .iter()
            .map(|f| (map.bs_frag_id(*f), CollectionBuilder::new(*f, self.drawer_format(map, *f))))
            .collect();
        let beam = (rob_to_partition(rod.header.source_id) & 0xF) == 0;
        let mut scanner = self.scanner(rod);

        for sub in scanner.by_ref() {
            let header = sub.header(beam);
            // trigger summaries and muon receiver data share frag ids with the drawers
            if matches!(header.type_class(), 0x10 | 0x40) {
                continue;
            }
            let Some((_, builder)) = builders.iter_mut().find(|(bs, _)| *bs == header.frag_id) else {
                continue;
            };
            builder.saw_fragment();
            if !self.wants(header.frag_type) {
                continue;
            }
            let format = builder.format();
            let ctx = UnpackContext {
                header,
                version: rod.header.version,
                overhead: sub.overhead,
                format,
                order: self.tables.for_fragment(header.frag_type, format.kind),
                weights: &self.weights,
                diag: &self.diag,
                mask_bad_digits: self.options.mask_bad_digits,
            };
            match unpack::unpack_drawer(&ctx, sub.payload) {
                Ok(unpacked) => {
                    let compressed = header.frag_type == SubFragmentType::Compressed;
                    let keep_digits = !compressed || self.options.use_frag5_raw;
                    let keep_channels = !compressed || self.options.use_frag5_reco;
                    builder.absorb(&header, unpacked, keep_digits, keep_channels);
                }
                Err(e) => self.log_dropped(builder.frag_id(), &header, &e),
            }
        }
        scanner.finish();

        builders
            .into_iter()
            .map(|(_, builder)| {
                let collection = builder.finish(Some(&rod.header), rod.error_bits());
                if self.options.verbose {
                    spdlog::debug!(
                        "{}: status {}, {} digits, {} channels, suspect DMUs {:#06x}, crc mask {:#010x}",
                        DrawerName(collection.frag_id),
                        collection.status(),
                        collection.digits.len(),
                        collection.channels.len(),
                        collection.metadata.suspect_dmus(),
                        collection.metadata.crc_mask
                    );
                }
                collection
            })
            .collect()
    }

    /// Decode one logical drawer. `rob` is None when the event has no ROB for it.
    pub fn fill_collection(&self, rob: Option<&RobFragment>, frag_id: u16, map: &IdentityMap) -> DrawerCollection {
        let Some(rob) = rob else {
            return self.missing_rob(map, frag_id);
        };
        match self.parse_rod(rob) {
            Some(rod) => self
                .decode_drawers(&rod, &[frag_id], map)
                .pop()
                .unwrap_or_else(|| self.missing_rob(map, frag_id)),
            None => CollectionBuilder::new(frag_id, self.drawer_format(map, frag_id)).finish(None, 0),
        }
    }

    /// Every sub-fragment of the given type, with its ROD-level id space
    fn matching<'a>(&'a self, rod: &'a RodFragment<'a>, beam: bool, filter: impl Fn(&SubFragmentHeader) -> bool + 'a) -> impl Iterator<Item = (SubFragmentHeader, SubFragment<'a>)> + 'a {
        self.scanner(rod)
            .map(move |sub| (sub.header(beam), sub))
            .filter(move |(header, _)| filter(header))
    }

    /// Beam-crate elements of a ROS 0 ROD. Laser blocks in the same ROD are skipped.
    pub fn fill_beam(&self, rod: &RodFragment) -> Vec<BeamElement> {
        self.matching(rod, true, |h| {
            !matches!(h.frag_type, SubFragmentType::Laser | SubFragmentType::Laser2)
        })
        .flat_map(|(header, sub)| unpack::beam::unpack_beam(header.frag_id, sub.payload))
        .collect()
    }

    /// The laser block of the laser ROD, if it has one
    pub fn fill_laser(&self, rod: &RodFragment) -> Option<LaserRecord> {
        let (header, sub) = self
            .matching(rod, true, |h| {
                matches!(h.frag_type, SubFragmentType::Laser | SubFragmentType::Laser2)
            })
            .next()?;
        match unpack::laser::unpack_laser(header.frag_type, sub.payload) {
            Ok(record) => Some(record),
            Err(e) => {
                self.log_dropped(header.frag_id, &header, &e);
                None
            }
        }
    }

    /// L2 summaries of a drawer ROD
    pub fn fill_l2(&self, rod: &RodFragment, map: &IdentityMap) -> Vec<L2Summary> {
        let mut summaries = Vec::new();
        for (header, sub) in self.matching(rod, false, |h| matches!(h.frag_type, SubFragmentType::L2(_))) {
            let SubFragmentType::L2(content) = header.frag_type else {
                continue;
            };
            let frag_id = map
                .rob_fragment(Subsystem::Main, header.frag_id)
                .unwrap_or(header.frag_id);
            match unpack::l2::unpack_l2(frag_id, content, sub.payload) {
                Ok(mut s) => summaries.append(&mut s),
                Err(e) => self.log_dropped(frag_id, &header, &e),
            }
        }
        summaries
    }

    /// Run a TMDB unpacker over every known board sub-fragment of `frag_type`
    fn fill_tmdb<T>(
        &self,
        rod: &RodFragment,
        map: &IdentityMap,
        frag_type: SubFragmentType,
        unpacker: fn(u16, &[u32]) -> Result<Vec<T>, UnpackError>,
    ) -> Vec<T> {
        let mut records = Vec::new();
        for (header, sub) in self.matching(rod, false, move |h| h.frag_type == frag_type) {
            if map.tmdb_entry(header.frag_id).is_none() {
                if self.diag.warning() {
                    spdlog::warn!("Unknown muon receiver board {:#x} in ROD {:#x}", header.frag_id, rod.header.source_id);
                }
                continue;
            }
            match unpacker(header.frag_id, sub.payload) {
                Ok(mut r) => records.append(&mut r),
                Err(e) => self.log_dropped(header.frag_id, &header, &e),
            }
        }
        records
    }

    pub fn fill_tmdb_digits(&self, rod: &RodFragment, map: &IdentityMap) -> Vec<TmdbDigits> {
        self.fill_tmdb(rod, map, SubFragmentType::TmdbDigits, unpack::tmdb::unpack_tmdb_digits)
    }

    pub fn fill_tmdb_raw_channels(&self, rod: &RodFragment, map: &IdentityMap) -> Vec<TmdbRawChannel> {
        self.fill_tmdb(rod, map, SubFragmentType::TmdbRawChannels, unpack::tmdb::unpack_tmdb_raw_channels)
    }

    pub fn fill_tmdb_decisions(&self, rod: &RodFragment, map: &IdentityMap) -> Vec<TmdbDecision> {
        self.fill_tmdb(rod, map, SubFragmentType::TmdbDecisions, unpack::tmdb::unpack_tmdb_decisions)
    }

    /// Decode a whole event against one identity map snapshot. Every main-space drawer of
    /// the map gets a collection.
    pub fn decode_event(&self, event: &RawEvent, map: &IdentityMap) -> DecodedEvent {
        let mut decoded = DecodedEvent {
            run_number: map.run(),
            ..Default::default()
        };

        let robs: BTreeSet<u32> = map
            .frag_ids()
            .into_iter()
            .filter_map(|f| map.logical_to_rod(f))
            .map(rod_to_rob)
            .collect();
        for rob_id in robs {
            let frags = map.frags_for_rob(rob_id);
            let rod = event.rob(rob_id).and_then(|rob| self.parse_rod(rob));
            match rod {
                Some(rod) => {
                    for collection in self.decode_drawers(&rod, frags, map) {
                        decoded.drawers.insert(collection);
                    }
                    decoded.l2.extend(self.fill_l2(&rod, map));
                }
                None => {
                    for frag in frags {
                        decoded.drawers.insert(self.missing_rob(map, *frag));
                    }
                }
            }
        }

        let laser_rob = map
            .source_id(Subsystem::Laser, LASER_FRAG_IDS[0])
            .map(rod_to_rob)
            .unwrap_or(LASER_ROD_ID);
        if let Some(rod) = event.rob(laser_rob).and_then(|rob| self.parse_rod(rob)) {
            decoded.laser = self.fill_laser(&rod);
            decoded.beam = self.fill_beam(&rod);
        }

        let tmdb_robs: BTreeSet<u32> = map
            .tmdb_boards()
            .into_iter()
            .filter_map(|bs| map.tmdb_entry(bs).map(|e| e.rob_source_id))
            .collect();
        for rob_id in tmdb_robs {
            if let Some(rod) = event.rob(rob_id).and_then(|rob| self.parse_rod(rob)) {
                decoded.tmdb_digits.extend(self.fill_tmdb_digits(&rod, map));
                decoded.tmdb_raw_channels.extend(self.fill_tmdb_raw_channels(&rod, map));
                decoded.tmdb_decisions.extend(self.fill_tmdb_decisions(&rod, map));
            }
        }
        decoded
    }
}
