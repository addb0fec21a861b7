// Modules
pub mod binning;
pub mod calibrator;
pub mod constants;
pub mod errors;
pub mod isotonic;
pub mod lookup;
pub mod pipeline;
pub mod scaler;
pub mod smoothing;
pub mod utils;

// Individual classes, and functions
pub use binning::BinningMethod;
pub use calibrator::{CalibratorConfig, QuantileCalibrator};
pub use errors::CalibrationError;
pub use lookup::LookupTable;
pub use pipeline::{Estimator, ModelIO, Pipeline, Regressor, RegressorTransformer, Transformer};
pub use scaler::QuantileScaler;
