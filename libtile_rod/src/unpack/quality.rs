use super::Unpacked;
use crate::metadata::DataQuality;

/// Type 0xA: six words of paired 16-bit masks. Missing words read as zero.
pub fn unpack_quality(payload: &[u32]) -> Unpacked {
    let halves = |i: usize| {
        let word = payload.get(i).copied().unwrap_or(0);
        (word & 0xFFFF, word >> 16)
    };
    let (global_crc, dsp_bcid) = halves(0);
    let (bcid_error_mask, memory_parity_mask) = halves(1);
    let (single_strobe_mask, double_strobe_mask) = halves(2);
    let (header_format_mask, header_parity_mask) = halves(3);
    let (sample_format_mask, sample_parity_mask) = halves(4);
    let (fe_chip_mask, rod_chip_mask) = halves(5);

    let mut out = Unpacked::new();
    out.meta.set_quality(DataQuality {
        global_crc,
        dsp_bcid,
        bcid_error_mask,
        memory_parity_mask,
        single_strobe_mask,
        double_strobe_mask,
        header_format_mask,
        header_parity_mask,
        sample_format_mask,
        sample_parity_mask,
        fe_chip_mask,
        rod_chip_mask,
    });
    out
}
