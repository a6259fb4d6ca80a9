//! # Techniques and Technique Resolution
//!
//! A technique is an ordered list of passes for one shading language, tagged
//! with strings and pinned to one [`ShaderVariation`].
//!
//! ## Resolution
//!
//! ```text
//!   for each technique carrying every requested tag:
//!     for each (name, value) in technique.variation:
//!         search says     internal says    result
//!         ───────────     ─────────────    ──────────────────────────────
//!         nothing         nothing          score += raw bits of value
//!         nothing         other value      reject
//!         nothing         same value       internal matched
//!         other value     same value       both matched, unless override
//!         other value     else             reject
//!         same value      nothing          search matched
//!         same value      other value      both matched if override, else reject
//!         same value      same value       both matched
//!     accept if every search param and every internal param was matched
//!   lowest score wins, ties keep the first
//! ```
//!
//! The score adds raw bit patterns, so a float default is ranked by its bits,
//! not its magnitude. The sum wraps.

use std::sync::Arc;

use bsf_core::Counterpart;

use crate::error::MaterialResult;
use crate::gpu::{RenderApi, RenderCapabilities};

use super::pass::{CorePass, Pass, PassDesc};
use super::variation::ShaderVariation;

/// What a technique is compiled from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TechniqueDesc {
    /// Shading language of every pass, or "Any".
    pub language: String,
    /// Tags, e.g. "Forward" or "Skinned".
    pub tags: Vec<String>,
    /// Variation this technique was built for.
    pub variation: ShaderVariation,
    /// Passes in draw order.
    pub passes: Vec<PassDesc>,
}

impl TechniqueDesc {
    /// A technique in `language` with no tags and an empty variation.
    #[must_use]
    pub fn new(language: &str) -> Self {
        Self { language: language.to_string(), ..Self::default() }
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Sets the variation.
    #[must_use]
    pub fn with_variation(mut self, variation: ShaderVariation) -> Self {
        self.variation = variation;
        self
    }

    /// Appends a pass.
    #[must_use]
    pub fn with_pass(mut self, pass: PassDesc) -> Self {
        self.passes.push(pass);
        self
    }
}

/// The fields technique resolution looks at.
pub trait TechniqueInfo {
    /// Tags of the technique.
    fn tags(&self) -> &[String];

    /// Variation of the technique.
    fn variation(&self) -> &ShaderVariation;

    /// Returns true if the technique carries `tag`.
    fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|own| own == tag)
    }

    /// Returns true if the technique carries any tag.
    fn has_tags(&self) -> bool {
        !self.tags().is_empty()
    }
}

impl<T: TechniqueInfo> TechniqueInfo for Arc<T> {
    fn tags(&self) -> &[String] {
        (**self).tags()
    }

    fn variation(&self) -> &ShaderVariation {
        (**self).variation()
    }
}

/// Core-thread technique. Passes are shared with the sim side.
#[derive(Debug)]
pub struct CoreTechnique {
    language: String,
    tags: Vec<String>,
    variation: ShaderVariation,
    passes: Vec<Arc<CorePass>>,
}

impl CoreTechnique {
    /// Shading language.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Number of passes.
    #[must_use]
    pub fn num_passes(&self) -> usize {
        self.passes.len()
    }

    /// Pass at `index`.
    #[must_use]
    pub fn pass(&self, index: usize) -> Option<&Arc<CorePass>> {
        self.passes.get(index)
    }

    /// Every pass in draw order.
    #[must_use]
    pub fn passes(&self) -> &[Arc<CorePass>] {
        &self.passes
    }

    /// Compiles every pass.
    ///
    /// # Errors
    ///
    /// Returns the first pass compilation failure.
    pub fn compile(&self, api: &dyn RenderApi) -> MaterialResult<()> {
        for pass in &self.passes {
            pass.create_pipeline_state(api)?;
        }
        Ok(())
    }
}

impl TechniqueInfo for CoreTechnique {
    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn variation(&self) -> &ShaderVariation {
        &self.variation
    }
}

/// Sim-thread technique.
#[derive(Debug)]
pub struct Technique {
    desc: TechniqueDesc,
    passes: Vec<Pass>,
    core: Arc<CoreTechnique>,
}

impl Technique {
    /// Builds the passes of `desc`. Nothing is compiled yet.
    #[must_use]
    pub fn new(desc: TechniqueDesc) -> Self {
        let passes: Vec<Pass> = desc.passes.iter().cloned().map(Pass::new).collect();
        let core = Arc::new(CoreTechnique {
            language: desc.language.clone(),
            tags: desc.tags.clone(),
            variation: desc.variation.clone(),
            passes: passes.iter().map(|pass| Arc::clone(pass.core())).collect(),
        });
        Self { desc, passes, core }
    }

    /// Shading language.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.desc.language
    }

    /// Returns true if the active backend can compile this technique.
    #[must_use]
    pub fn is_supported(&self, caps: &RenderCapabilities) -> bool {
        caps.supports_language(&self.desc.language)
    }

    /// Number of passes.
    #[must_use]
    pub fn num_passes(&self) -> usize {
        self.passes.len()
    }

    /// Pass at `index`.
    #[must_use]
    pub fn pass(&self, index: usize) -> Option<&Pass> {
        self.passes.get(index)
    }

    /// Compiles every pass.
    ///
    /// # Errors
    ///
    /// Returns the first pass compilation failure.
    pub fn compile(&self, api: &dyn RenderApi) -> MaterialResult<()> {
        self.core.compile(api)
    }

    /// The core-thread counterpart.
    #[must_use]
    pub fn core(&self) -> &Arc<CoreTechnique> {
        &self.core
    }
}

impl TechniqueInfo for Technique {
    fn tags(&self) -> &[String] {
        &self.desc.tags
    }

    fn variation(&self) -> &ShaderVariation {
        &self.desc.variation
    }
}

impl Counterpart for Technique {
    type SimRef = Option<Arc<Technique>>;
    type Core = CoreTechnique;

    fn resolve(sim: &Self::SimRef) -> Option<Arc<CoreTechnique>> {
        sim.as_ref().map(|technique| Arc::clone(&technique.core))
    }
}

/// Search criteria for [`find_technique`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindTechniqueDesc {
    /// Tags the technique must all carry.
    pub tags: Vec<String>,
    /// Variation the technique must satisfy. `None` leaves it to the
    /// material's own variation.
    pub variation: Option<ShaderVariation>,
    /// Lets the search variation take precedence over the material's own.
    pub override_variation: bool,
}

impl FindTechniqueDesc {
    /// Empty criteria.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `tag`.
    #[must_use]
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Requires `variation`.
    #[must_use]
    pub fn with_variation(mut self, variation: ShaderVariation, override_variation: bool) -> Self {
        self.variation = Some(variation);
        self.override_variation = override_variation;
        self
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ParamMatch {
    NoParam,
    NotMatching,
    Matching,
}

fn param_match(variation: &ShaderVariation, name: &str, bits: u32) -> ParamMatch {
    match variation.get(name) {
        None => ParamMatch::NoParam,
        Some(param) if param.bits == bits => ParamMatch::Matching,
        Some(_) => ParamMatch::NotMatching,
    }
}

/// Scores one technique against the search and internal variations.
/// `None` means the technique is rejected.
fn score_technique(
    technique: &ShaderVariation,
    search: Option<&ShaderVariation>,
    internal: &ShaderVariation,
    override_variation: bool,
) -> Option<u32> {
    let mut score = 0u32;
    let mut search_matches = 0usize;
    let mut internal_matches = 0usize;

    for (name, param) in technique.iter() {
        let in_search = search.map_or(ParamMatch::NoParam, |s| param_match(s, name, param.bits));
        let in_internal = param_match(internal, name, param.bits);

        match (in_search, in_internal) {
            (ParamMatch::NoParam, ParamMatch::NoParam) => score = score.wrapping_add(param.bits),
            (ParamMatch::NoParam, ParamMatch::Matching) => internal_matches += 1,
            (ParamMatch::NotMatching, ParamMatch::Matching) if !override_variation => {
                search_matches += 1;
                internal_matches += 1;
            }
            (ParamMatch::Matching, ParamMatch::NoParam) => search_matches += 1,
            (ParamMatch::Matching, ParamMatch::NotMatching) if override_variation => {
                search_matches += 1;
                internal_matches += 1;
            }
            (ParamMatch::Matching, ParamMatch::Matching) => {
                search_matches += 1;
                internal_matches += 1;
            }
            _ => return None,
        }
    }

    let search_satisfied = search.map_or(true, |s| search_matches == s.len());
    (search_satisfied && internal_matches == internal.len()).then_some(score)
}

/// Picks the best technique for `desc` given the material's own variation.
///
/// Returns `None` if no technique qualifies.
pub fn find_technique<T: TechniqueInfo>(
    techniques: &[T],
    desc: &FindTechniqueDesc,
    internal: &ShaderVariation,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    let mut best_score = u32::MAX;

    for (index, technique) in techniques.iter().enumerate() {
        if !desc.tags.iter().all(|tag| technique.has_tag(tag)) {
            continue;
        }

        let Some(score) = score_technique(
            technique.variation(),
            desc.variation.as_ref(),
            internal,
            desc.override_variation,
        ) else {
            continue;
        };

        if score < best_score {
            best_score = score;
            best = Some(index);
        }
    }

    if best.is_none() {
        tracing::warn!("No technique matches tags {:?}", desc.tags);
    }
    best
}

/// Picks the best untagged technique for the material's own variation.
///
/// Falls back to index 0 when nothing qualifies, even if that technique is
/// tagged. Callers check the index against the technique count.
pub fn default_technique<T: TechniqueInfo>(techniques: &[T], internal: &ShaderVariation) -> usize {
    let mut best = 0;
    let mut best_score = u32::MAX;

    for (index, technique) in techniques.iter().enumerate() {
        if technique.has_tags() {
            continue;
        }

        let Some(score) = score_technique(technique.variation(), None, internal, false) else {
            continue;
        };

        if score < best_score {
            best_score = score;
            best = index;
        }
    }

    best
}

/// Index of the first technique carrying `tag`.
pub fn find_technique_by_tag<T: TechniqueInfo>(techniques: &[T], tag: &str) -> Option<usize> {
    techniques.iter().position(|technique| technique.has_tag(tag))
}
