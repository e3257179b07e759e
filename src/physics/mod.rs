pub mod bc;
pub mod diffusion;
