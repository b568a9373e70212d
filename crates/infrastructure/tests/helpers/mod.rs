pub mod builders;
pub mod upstream_mock;

#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use upstream_mock::*;
