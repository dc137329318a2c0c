// Fingerprinting and similarity clustering engine.
// Data flow: paths -> orchestrator (decode + fingerprint) -> records ->
// cluster -> duplicate groups -> keepers.

pub mod cluster;
pub mod decode;
pub mod duplicate;
pub mod fingerprint;
pub mod orchestrator;
pub mod record;
