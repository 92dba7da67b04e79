//! Integration tests for vits-convert
//!
//! Drives renaming, validation, loading and the full folder conversion
//! through the public API.

use candle_core::{safetensors, DType, Device, Tensor};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use vits_convert::convert::{load_state_dict, validate, KeyDiff};
use vits_convert::models::ParameterGroup;
use vits_convert::{
    adapt_checkpoint, convert_checkpoint, ConversionSource, ConvertError, ConvertOptions,
    IgnorePatterns, MismatchKind, ParameterMapping, RenameTable, Reparameterize, StateDict,
    VitsConfig, VitsDiscriminator,
};

fn keys(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|k| k.to_string()).collect()
}

/// Smallest discriminator layout the fixed group counts allow
fn small_config() -> VitsConfig {
    VitsConfig {
        discriminator_scale_channels: vec![1, 4, 16, 64, 256],
        discriminator_period_channels: vec![1, 4, 8],
        discriminator_periods: vec![2, 3],
        ..Default::default()
    }
}

/// Checkpoint as the original training code writes it: weight-normalized,
/// `conv_post` naming, plus an attention bias buffer the module lacks
fn original_checkpoint(discriminator: &VitsDiscriminator) -> ParameterMapping {
    let mut expanded = discriminator.clone();
    expanded.apply_weight_norm().unwrap();
    let mut mapping: ParameterMapping = expanded
        .named_parameters()
        .into_iter()
        .enumerate()
        .map(|(i, (k, t))| {
            let value = Tensor::full(0.01f32 * (i + 1) as f32, t.dims(), &Device::Cpu).unwrap();
            (k.replace("final_conv", "conv_post"), value)
        })
        .collect();
    mapping.insert(
        "discriminators.0.attn.bias".to_string(),
        Tensor::zeros(4, DType::F32, &Device::Cpu).unwrap(),
    );
    mapping
}

/// Rename `conv_post.weight`, validate against `final_conv.weight`, load
#[test]
fn test_rename_validate_load() {
    let device = Device::Cpu;
    let mut module = ParameterGroup::from_tensors(
        "toy",
        vec![("final_conv.weight", Tensor::zeros((2, 3), DType::F32, &device).unwrap())],
    );
    let value = Tensor::new(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]], &device).unwrap();
    let mut source = ParameterMapping::new();
    source.insert("conv_post.weight".to_string(), value.clone());

    let renamed = RenameTable::discriminator().apply(source).unwrap();
    assert_eq!(renamed.keys().cloned().collect::<BTreeSet<_>>(), keys(&["final_conv.weight"]));

    validate(&renamed, &module.state_dict_keys(), &IgnorePatterns::default()).unwrap();
    let report = load_state_dict(&mut module, renamed, false).unwrap();
    assert!(report.is_complete());

    let loaded = module.parameter("final_conv.weight").unwrap();
    assert_eq!(
        loaded.to_vec2::<f32>().unwrap(),
        value.to_vec2::<f32>().unwrap()
    );
}

/// Same setup, but the module also declares `final_conv.bias`
#[test]
fn test_missing_bias_is_named() {
    let device = Device::Cpu;
    let module = ParameterGroup::from_tensors(
        "toy",
        vec![
            ("final_conv.weight", Tensor::zeros((2, 3), DType::F32, &device).unwrap()),
            ("final_conv.bias", Tensor::zeros(2, DType::F32, &device).unwrap()),
        ],
    );
    let mut source = ParameterMapping::new();
    source.insert(
        "conv_post.weight".to_string(),
        Tensor::ones((2, 3), DType::F32, &device).unwrap(),
    );

    let renamed = RenameTable::discriminator().apply(source).unwrap();
    let err = validate(&renamed, &module.state_dict_keys(), &IgnorePatterns::default()).unwrap_err();

    let (kind, missing) = err.mismatched_keys().unwrap();
    assert_eq!(kind, MismatchKind::MissingKeys);
    assert_eq!(missing, &keys(&["final_conv.bias"]));
    assert_eq!(err.to_string(), "missing keys: {'final_conv.bias'}");
}

#[test]
fn test_extra_key_message() {
    let diff = KeyDiff::compute(
        keys(&["a.weight", "b.weight", "stray.weight"]).iter(),
        &keys(&["a.weight", "b.weight"]),
        &IgnorePatterns::default(),
    );
    let err = diff.into_result().unwrap_err();
    assert_eq!(err.to_string(), "extra keys found: {'stray.weight'}");
}

#[test]
fn test_attention_bias_ignored_on_both_sides() {
    let ignore = IgnorePatterns::default();
    let expected = keys(&["enc.weight", "enc.layers.0.attn.bias"]);
    assert!(KeyDiff::compute(keys(&["enc.weight"]).iter(), &expected, &ignore).is_clean());

    let expected = keys(&["enc.weight"]);
    let provided = keys(&["enc.weight", "enc.layers.1.attn.bias"]);
    assert!(KeyDiff::compute(provided.iter(), &expected, &ignore).is_clean());
}

#[test]
fn test_weight_norm_round_trip_on_discriminator() {
    let mut discriminator = VitsDiscriminator::new(&small_config(), &Device::Cpu).unwrap();
    let before: HashMap<String, Vec<f32>> = discriminator
        .named_parameters()
        .into_iter()
        .map(|(k, t)| (k, t.flatten_all().unwrap().to_vec1().unwrap()))
        .collect();

    discriminator.apply_weight_norm().unwrap();
    assert!(discriminator
        .state_dict_keys()
        .iter()
        .any(|k| k.ends_with(".weight_g")));
    discriminator.remove_weight_norm().unwrap();

    for (k, t) in discriminator.named_parameters() {
        let after: Vec<f32> = t.flatten_all().unwrap().to_vec1().unwrap();
        for (a, b) in after.iter().zip(before[&k].iter()) {
            assert!((a - b).abs() < 1e-5, "{k}: {a} vs {b}");
        }
    }
}

#[test]
fn test_adapt_original_checkpoint() {
    let mut discriminator = VitsDiscriminator::new(&small_config(), &Device::Cpu).unwrap();
    let source = original_checkpoint(&discriminator);
    let bias = source["discriminators.1.conv_post.bias"]
        .to_vec1::<f32>()
        .unwrap();

    let report = adapt_checkpoint(
        &mut discriminator,
        source,
        &RenameTable::discriminator(),
        &IgnorePatterns::default(),
    )
    .unwrap();

    assert!(!discriminator.is_weight_normed());
    assert_eq!(report.unexpected, vec!["discriminators.0.attn.bias".to_string()]);
    assert!(report.missing.is_empty());
    assert_eq!(
        discriminator
            .parameter("discriminators.1.final_conv.bias")
            .unwrap()
            .to_vec1::<f32>()
            .unwrap(),
        bias
    );
}

#[test]
fn test_adapt_failure_keeps_module_collapsed() {
    let mut discriminator = VitsDiscriminator::new(&small_config(), &Device::Cpu).unwrap();
    let mut source = original_checkpoint(&discriminator);
    source.remove("discriminators.2.convs.0.weight_v");

    let err = adapt_checkpoint(
        &mut discriminator,
        source,
        &RenameTable::discriminator(),
        &IgnorePatterns::default(),
    )
    .unwrap_err();

    assert!(matches!(err, ConvertError::Validation { .. }));
    assert_eq!(
        err.mismatched_keys().unwrap().1,
        &keys(&["discriminators.2.convs.0.weight_v"])
    );
    assert!(!discriminator.is_weight_normed());
}

fn write_generator_dir(dir: &Path, config: &VitsConfig) {
    let device = Device::Cpu;
    let mut tensors = HashMap::new();
    for group in ["text_encoder", "flow", "decoder", "duration_predictor", "posterior_encoder"] {
        tensors.insert(
            format!("{group}.proj.weight"),
            Tensor::ones((3, 2), DType::F32, &device).unwrap(),
        );
    }
    tensors.insert(
        "embed_speaker.weight".to_string(),
        Tensor::ones((1, 4), DType::F32, &device).unwrap(),
    );
    safetensors::save(&tensors, dir.join("model.safetensors")).unwrap();

    let mut value = serde_json::to_value(config).unwrap();
    value["hidden_size"] = serde_json::json!(192);
    std::fs::write(dir.join("config.json"), value.to_string()).unwrap();
    std::fs::write(dir.join("vocab.json"), r#"{"_": 0, "a": 1, "b": 2}"#).unwrap();
    std::fs::write(dir.join("tokenizer_config.json"), r#"{"add_blank": true}"#).unwrap();
}

#[test]
fn test_convert_local_folder() {
    let config = small_config();
    let generator_dir = tempfile::tempdir().unwrap();
    write_generator_dir(generator_dir.path(), &config);

    let work = tempfile::tempdir().unwrap();
    let discriminator = VitsDiscriminator::new(&config, &Device::Cpu).unwrap();
    let checkpoint = original_checkpoint(&discriminator);
    let checkpoint_path = work.path().join("D_100000.safetensors");
    safetensors::save(&checkpoint, &checkpoint_path).unwrap();

    let output = work.path().join("out");
    let options = ConvertOptions::new(
        ConversionSource::Paths {
            checkpoint: checkpoint_path,
            generator: generator_dir.path().to_string_lossy().into_owned(),
        },
        &output,
    );
    let summary = convert_checkpoint(&options).unwrap();

    assert!(summary.pushed_to.is_none());
    assert_eq!(summary.discriminator.unexpected.len(), 1);
    assert_eq!(summary.tokenizer_files.len(), 2);

    let weights = safetensors::load(output.join("model.safetensors"), &Device::Cpu).unwrap();
    assert!(weights.contains_key("text_encoder.proj.weight"));
    assert!(weights.contains_key("discriminator.discriminators.0.final_conv.weight"));
    assert!(weights.keys().all(|k| !k.ends_with("weight_g") && !k.ends_with("weight_v")));
    assert!(!weights.contains_key("embed_speaker.weight"));
    assert_eq!(
        weights["discriminator.discriminators.2.final_conv.bias"]
            .to_vec1::<f32>()
            .unwrap(),
        checkpoint["discriminators.2.conv_post.bias"]
            .to_vec1::<f32>()
            .unwrap()
    );

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("config.json")).unwrap()).unwrap();
    assert_eq!(written["architectures"][0], "VitsModelForPreTraining");
    assert_eq!(written["hidden_size"], 192);

    let preprocessor: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output.join("preprocessor_config.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(preprocessor["feature_size"], 80);
    assert_eq!(preprocessor["sampling_rate"], 16000);
    assert!(output.join("vocab.json").exists());
}
