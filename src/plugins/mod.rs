//! Built-in plugins
//!
//! Registration order matters: for WAV, the hound decoder is tried before
//! symphonia, which only sees the files hound declines.

pub mod lofty_tags;
pub mod replaygain;
pub mod symphonia_codec;
pub mod wave;

pub use lofty_tags::LoftyMetadataCodec;
pub use replaygain::ReplayGainAnalyzer;
pub use symphonia_codec::SymphoniaDecoder;
pub use wave::{WaveDecoder, WaveEncoder};

use crate::registry::{CapabilityDescriptor, RegistryBuilder, DESCRIPTION, FORMAT};

const SYMPHONIA_EXTENSIONS: [&str; 8] = ["wav", "flac", "mp3", "ogg", "m4a", "aac", "aif", "aiff"];
const TAGGED_EXTENSIONS: [&str; 5] = ["wav", "flac", "mp3", "ogg", "m4a"];

/// Add every built-in plugin to `builder`
pub fn register_defaults(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .decoder(
            CapabilityDescriptor::named("Wave")
                .with(DESCRIPTION, "Integer and float PCM WAV")
                .with_extensions(["wav"]),
            || Box::<WaveDecoder>::default(),
        )
        .decoder(
            CapabilityDescriptor::named("Symphonia")
                .with(DESCRIPTION, "FLAC, MP3, Vorbis, AAC, AIFF and WAV variants")
                .with_extensions(SYMPHONIA_EXTENSIONS),
            || Box::<SymphoniaDecoder>::default(),
        )
        .encoder(
            CapabilityDescriptor::named("Wave")
                .with(DESCRIPTION, "Integer PCM WAV")
                .with_extensions(["wav"]),
            || Box::<WaveEncoder>::default(),
        )
        .analyzer(
            CapabilityDescriptor::named("ReplayGain")
                .with(DESCRIPTION, "Track and album peak and gain"),
            || Box::<ReplayGainAnalyzer>::default(),
        )
        .metadata_codec(
            CapabilityDescriptor::named("Lofty")
                .with(FORMAT, "Native")
                .with_extensions(TAGGED_EXTENSIONS),
            || Box::new(LoftyMetadataCodec),
        )
}
