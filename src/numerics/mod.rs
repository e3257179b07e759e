pub mod check;
pub mod timing;
