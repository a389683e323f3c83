pub mod bernstein;
pub mod dispersion;
pub mod fft;
pub mod ftest;
pub mod kde;
pub mod smooth;
pub mod stats;
pub mod window;

pub use bernstein::BernsteinBasis;
pub use dispersion::DispersionSolver;
pub use fft::FftHelper;
pub use kde::GaussianKde;
pub use stats::StatsHelper;
