//! Technique selection over tags, search variations and the material's own variation.

use bsf_rendering::gpu::RenderCapabilities;
use bsf_rendering::material::{
    default_technique, find_technique, FindTechniqueDesc, Material, PassDesc, Shader, ShaderDesc,
    ShaderVariation, Technique, TechniqueDesc, TechniqueInfo,
};
use bsf_core::ResourceHandle;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn technique(tags: &[&str], variation: ShaderVariation) -> Technique {
    let mut desc = TechniqueDesc::new("hlsl").with_variation(variation);
    for tag in tags {
        desc = desc.with_tag(tag);
    }
    Technique::new(desc)
}

fn quality(value: i32) -> ShaderVariation {
    ShaderVariation::new().with_int("QUALITY", value)
}

#[test]
fn test_single_plain_technique_is_default() {
    let techniques = [technique(&[], ShaderVariation::new())];
    assert_eq!(default_technique(&techniques, &ShaderVariation::new()), 0);
    assert_eq!(find_technique(&techniques, &FindTechniqueDesc::new(), &ShaderVariation::new()), Some(0));
}

#[test]
fn test_default_falls_back_to_zero_when_all_tagged() {
    let techniques = [
        technique(&["Shadow"], ShaderVariation::new()),
        technique(&["Forward"], ShaderVariation::new()),
    ];
    assert_eq!(default_technique(&techniques, &ShaderVariation::new()), 0);
}

#[test]
fn test_default_skips_tagged_techniques() {
    let techniques = [
        technique(&["Shadow"], ShaderVariation::new()),
        technique(&[], ShaderVariation::new()),
    ];
    assert_eq!(default_technique(&techniques, &ShaderVariation::new()), 1);
}

#[test]
fn test_search_value_must_match_without_override() {
    // first technique scores lower on an unrelated parameter but has the wrong quality
    let techniques = [
        technique(&[], quality(1).with_int("MSAA", 0)),
        technique(&[], quality(2).with_int("MSAA", 4)),
    ];
    let desc = FindTechniqueDesc::new().with_variation(quality(2), false);
    assert_eq!(find_technique(&techniques, &desc, &ShaderVariation::new()), Some(1));
}

#[test]
fn test_internal_variation_wins_without_override() {
    let techniques = [technique(&[], quality(1)), technique(&[], quality(2))];
    let desc = FindTechniqueDesc::new().with_variation(quality(2), false);
    assert_eq!(find_technique(&techniques, &desc, &quality(1)), Some(0));
}

#[test]
fn test_search_variation_wins_with_override() {
    let techniques = [technique(&[], quality(1)), technique(&[], quality(2))];
    let desc = FindTechniqueDesc::new().with_variation(quality(2), true);
    assert_eq!(find_technique(&techniques, &desc, &quality(1)), Some(1));
}

#[test]
fn test_partial_search_match_rejected() {
    let techniques = [technique(&[], quality(2))];
    let search = quality(2).with_bool("SKINNED", true);
    let desc = FindTechniqueDesc::new().with_variation(search, false);
    assert_eq!(find_technique(&techniques, &desc, &ShaderVariation::new()), None);
}

#[test]
fn test_tags_filter_before_scoring() {
    let techniques = [
        technique(&[], ShaderVariation::new()),
        technique(&["Shadow", "Skinned"], quality(3)),
        technique(&["Shadow"], quality(1)),
    ];
    let desc = FindTechniqueDesc::new().with_tag("Shadow").with_tag("Skinned");
    assert_eq!(find_technique(&techniques, &desc, &ShaderVariation::new()), Some(1));
}

#[test]
fn test_material_resolves_through_its_variation() {
    let desc = ShaderDesc::new()
        .with_technique(TechniqueDesc::new("hlsl").with_variation(quality(1)).with_pass(PassDesc::graphics("hlsl", "vs", "ps")))
        .with_technique(TechniqueDesc::new("hlsl").with_variation(quality(2)).with_pass(PassDesc::graphics("hlsl", "vs", "ps")));
    let caps = RenderCapabilities::new("headless", &["hlsl"]);
    let shader = ResourceHandle::loaded("quality", Shader::new("quality", desc, &caps));

    let mut material = Material::with_shader(shader);
    material.set_variation(quality(2));
    assert_eq!(material.default_technique(), 1);

    material.set_variation(quality(1));
    assert_eq!(material.default_technique(), 0);

    material.set_variation(quality(3));
    // nothing qualifies; falls back to zero
    assert_eq!(material.default_technique(), 0);
}

#[test]
fn test_resolution_is_deterministic() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x7ec4);
    let tags = ["Shadow", "Forward", "Skinned"];
    let params = ["QUALITY", "MSAA", "FOG"];

    let random_variation = |rng: &mut ChaCha8Rng| {
        let mut variation = ShaderVariation::new();
        for param in params {
            if rng.gen_bool(0.5) {
                variation.set_int(param, rng.gen_range(0..3));
            }
        }
        variation
    };

    for _ in 0..200 {
        let count = rng.gen_range(1..6);
        let techniques: Vec<Technique> = (0..count)
            .map(|_| {
                let picked: Vec<&str> = tags.iter().copied().filter(|_| rng.gen_bool(0.3)).collect();
                let variation = random_variation(&mut rng);
                technique(&picked, variation)
            })
            .collect();

        let mut desc = FindTechniqueDesc::new();
        if rng.gen_bool(0.3) {
            desc = desc.with_tag(tags[rng.gen_range(0..tags.len())]);
        }
        if rng.gen_bool(0.5) {
            let search = random_variation(&mut rng);
            desc = desc.with_variation(search, rng.gen_bool(0.5));
        }
        let internal = random_variation(&mut rng);

        let first = find_technique(&techniques, &desc, &internal);
        let default = default_technique(&techniques, &internal);
        for _ in 0..3 {
            assert_eq!(find_technique(&techniques, &desc, &internal), first);
            assert_eq!(default_technique(&techniques, &internal), default);
        }
        if let Some(index) = first {
            assert!(index < techniques.len());
            assert!(desc.tags.iter().all(|tag| techniques[index].has_tag(tag)));
        }
        assert!(default < techniques.len());
    }
}
