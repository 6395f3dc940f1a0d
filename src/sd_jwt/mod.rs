//! SD-JWT VC presentations.
pub mod disclosure;
pub mod engine;
pub mod jwt;
pub mod verify;

pub use disclosure::Disclosure;
pub use engine::{
    Hasher, JwtVerifier, ProcessedSdJwt, SdJwtEngine, SdJwtPresentation, Sha2Hasher,
    StandardEngine,
};
pub use jwt::CompactJwt;
pub use verify::verify_sd_jwt_vc;
