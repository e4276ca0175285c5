pub mod ad;
pub mod media;
