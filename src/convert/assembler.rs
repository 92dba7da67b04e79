//! Build the pre-training model from a generator and a loaded discriminator
//!
//! The generator is taken by value: its submodules move into the combined
//! model, so nothing can mutate them through the old owner afterwards.

use crate::config::VitsConfig;
use crate::core::traits::Reparameterize;
use crate::models::{VitsDiscriminator, VitsGenerator, VitsModelForPreTraining};

/// Move the generator's submodules next to the discriminator
///
/// The speaker embedding is carried over only for multi-speaker
/// configurations. `config` must describe both inputs; this is not checked.
pub fn assemble(
    config: VitsConfig,
    generator: VitsGenerator,
    discriminator: VitsDiscriminator,
) -> VitsModelForPreTraining {
    debug_assert!(
        !discriminator.is_weight_normed(),
        "discriminator must be collapsed before assembly"
    );

    let VitsGenerator {
        text_encoder,
        flow,
        decoder,
        duration_predictor,
        posterior_encoder,
        embed_speaker,
    } = generator;

    let embed_speaker = if config.is_multi_speaker() {
        if embed_speaker.is_none() {
            tracing::warn!(
                "Config declares {} speakers but the generator has no speaker embedding",
                config.num_speakers
            );
        }
        embed_speaker
    } else {
        if embed_speaker.is_some() {
            tracing::debug!("Dropping speaker embedding of a single-speaker generator");
        }
        None
    };

    VitsModelForPreTraining {
        config,
        text_encoder,
        flow,
        decoder,
        duration_predictor,
        posterior_encoder,
        embed_speaker,
        discriminator,
    }
}
