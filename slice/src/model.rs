/// The two mutually exclusive forms a slice's pixel payload can take. The
/// JPEG-baseline variant already holds the decoder's output: rows*cols
/// 8-bit grayscale samples, rescale-uncalibrated (no slope/intercept was
/// applied — see `RawSlice::uncalibrated`).
#[derive(Clone, Debug)]
pub enum PixelPayload {
    /// Raw, owned copy of the uncompressed pixel-data bytes; length is
    /// `rows * cols * (bits_allocated / 8)`.
    Uncompressed(Vec<u8>),
    /// Decoded JPEG baseline grayscale samples; length is `rows * cols`.
    JpegDecoded(Vec<u8>),
}

/// One parsed 2D frame plus the subset of DICOM tags needed by
/// `SeriesAssembler`/`VolumeBuilder`. Produced by `SliceReader`, consumed by
/// `SeriesAssembler`, then discarded.
#[derive(Clone, Debug)]
pub struct RawSlice {
    pub rows: u16,
    pub columns: u16,
    pub bits_allocated: u16,
    pub signed: bool,
    pub transfer_syntax: String,
    pub payload: PixelPayload,
    /// Set when the payload is JPEG-decoded: no rescale slope/intercept was
    /// applied, per the preserved Open Question in spec.md section 9.
    pub uncalibrated: bool,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,
    pub image_position_patient: Option<[f64; 3]>,
    pub image_orientation_patient: Option<[f64; 6]>,
    pub pixel_spacing: Option<[f64; 2]>,
    pub instance_number: Option<i32>,
    pub slice_location: Option<f64>,
    pub sop_instance_uid: Option<String>,
    pub study_instance_uid: Option<String>,
    pub series_instance_uid: Option<String>,
    pub patient_id: Option<String>,
    pub frame_of_reference_uid: Option<String>,
    pub modality: Option<String>,
    pub study_date: Option<String>,
}

impl RawSlice {
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_allocated as usize / 8
    }
}
