//! Shader module manager
//!
//! Discovers vertex/fragment source pairs under the per-pass shader
//! directories, tracks their `#include` dependencies, recompiles stale
//! SPIR-V binaries through an external compiler script, and hands out
//! ready-to-use shader modules by render pass and name.

use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use ash::vk;

use crate::render::vulkan::{device_call, VulkanContext, VulkanError, VulkanResult};

/// Which render pass a shader module belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTag {
    /// Geometry/outline/skybox subpass
    First,
    /// Post-process composition subpass
    Second,
}

impl PassTag {
    const ALL: [Self; 2] = [Self::First, Self::Second];

    fn dir_name(self) -> &'static str {
        match self {
            Self::First => "first_pass",
            Self::Second => "second_pass",
        }
    }
}

/// Filesystem locations the manager works against.
///
/// Runtime parameters rather than compile-time constants so packaging and
/// tests can relocate the tree; validated once at startup.
#[derive(Debug, Clone)]
pub struct ShaderPaths {
    /// Directory containing `first_pass/` and `second_pass/`
    pub root: PathBuf,
    /// Directory resolved against by `#include` directives
    pub include_dir: PathBuf,
    /// External compiler script invoked once per stale batch
    pub compile_script: PathBuf,
}

/// The file set of a single shader module (one vertex + one fragment source
/// grouped by shared base name, with their expected binaries and includes).
#[derive(Debug, Clone)]
pub struct ShaderModuleEntry {
    /// Owning render pass
    pub pass: PassTag,
    /// Base name shared by both stages
    pub name: String,
    vert_src: PathBuf,
    frag_src: PathBuf,
    vert_spv: PathBuf,
    frag_spv: PathBuf,
    includes: Vec<PathBuf>,
}

impl ShaderModuleEntry {
    fn is_complete(&self) -> bool {
        self.vert_src.as_os_str().len() > 0 && self.frag_src.as_os_str().len() > 0
    }

    /// A module is stale when either binary is missing, or any of the two
    /// sources or any tracked include is newer than either binary.
    fn is_stale(&self) -> bool {
        let Some(oldest_binary) = [&self.vert_spv, &self.frag_spv]
            .iter()
            .map(|p| modified_time(p))
            .collect::<Option<Vec<_>>>()
            .and_then(|times| times.into_iter().min())
        else {
            return true;
        };

        [&self.vert_src, &self.frag_src]
            .into_iter()
            .chain(self.includes.iter())
            .any(|dep| modified_time(dep).map_or(true, |t| t > oldest_binary))
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Extract quoted `#include` paths from shader source text.
///
/// A simple line scan, not a preprocessor: only `#include "name"` is
/// recognized, angle-bracket includes and conditionals are ignored.
pub fn parse_includes(source: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let rest = trimmed.strip_prefix("#include")?.trim_start();
            let rest = rest.strip_prefix('"')?;
            let end = rest.find('"')?;
            Some(rest[..end].to_string())
        })
        .collect()
}

/// Scan the two pass directories and group sources into module entries.
///
/// Pre-compiled `.spv` files are skipped during discovery; binaries are
/// derived from source paths (`name.vert` → `name.vert.spv`). Entries come
/// back sorted by base name per pass, which makes the default (hint-less)
/// lookup deterministic.
pub fn collect_modules(paths: &ShaderPaths) -> VulkanResult<Vec<ShaderModuleEntry>> {
    let mut all = Vec::new();

    for pass in PassTag::ALL {
        let dir = paths.root.join(pass.dir_name());
        let mut by_stem: BTreeMap<String, ShaderModuleEntry> = BTreeMap::new();

        let entries = fs::read_dir(&dir).map_err(|e| {
            VulkanError::Shader(format!("cannot read shader directory {}: {e}", dir.display()))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                VulkanError::Shader(format!("cannot read shader directory entry: {e}"))
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let extension = path.extension().and_then(|e| e.to_str());
            let stage_is_vert = match extension {
                Some("vert") => true,
                Some("frag") => false,
                _ => continue,
            };

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            let module = by_stem
                .entry(stem.clone())
                .or_insert_with(|| ShaderModuleEntry {
                    pass,
                    name: stem,
                    vert_src: PathBuf::new(),
                    frag_src: PathBuf::new(),
                    vert_spv: PathBuf::new(),
                    frag_spv: PathBuf::new(),
                    includes: Vec::new(),
                });

            let spv = PathBuf::from(format!("{}.spv", path.display()));
            if stage_is_vert {
                module.vert_src = path;
                module.vert_spv = spv;
            } else {
                module.frag_src = path;
                module.frag_spv = spv;
            }
        }

        for (_, mut module) in by_stem {
            module.includes = collect_include_deps(&module, &paths.include_dir);
            all.push(module);
        }
    }

    Ok(all)
}

fn collect_include_deps(module: &ShaderModuleEntry, include_dir: &Path) -> Vec<PathBuf> {
    let mut deps = Vec::new();
    for src in [&module.vert_src, &module.frag_src] {
        if src.as_os_str().is_empty() {
            continue;
        }
        let Ok(text) = fs::read_to_string(src) else {
            continue;
        };
        for name in parse_includes(&text) {
            let dep = include_dir.join(name);
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
    }
    deps
}

/// Validate the directory tree and compiler script exist
fn validate_paths(paths: &ShaderPaths) -> VulkanResult<()> {
    if !paths.root.is_dir() {
        return Err(VulkanError::Shader(format!(
            "shader directory root does not exist: {}",
            paths.root.display()
        )));
    }
    if !paths.compile_script.is_file() {
        return Err(VulkanError::Shader(format!(
            "shader compile script does not exist: {}",
            paths.compile_script.display()
        )));
    }
    for pass in PassTag::ALL {
        let dir = paths.root.join(pass.dir_name());
        if !dir.is_dir() {
            return Err(VulkanError::Shader(format!(
                "required shader subfolder missing: {}",
                dir.display()
            )));
        }
    }
    Ok(())
}

/// Sources of every stale module, gathered for one batch compile
pub fn stale_sources(modules: &[ShaderModuleEntry]) -> Vec<PathBuf> {
    let mut sources = Vec::new();
    for module in modules {
        if module.is_complete() && module.is_stale() {
            log::info!(
                "shader module '{}' needs recompilation (binaries missing or outdated)",
                module.name
            );
            sources.push(module.vert_src.clone());
            sources.push(module.frag_src.clone());
        }
    }
    sources
}

/// A compiled vertex + fragment module pair
#[derive(Debug, Clone, Copy)]
pub struct ShaderStagePair {
    /// Vertex stage module
    pub vert: vk::ShaderModule,
    /// Fragment stage module
    pub frag: vk::ShaderModule,
}

/// The shader manager.
///
/// Construction performs discovery, staleness analysis, the batch compile
/// and the completeness check; afterwards `stages` is a lookup plus two
/// module-creation calls. Created `vk::ShaderModule`s accumulate until
/// `cleanup`.
pub struct ShaderCatalog {
    device: ash::Device,
    entries: Vec<ShaderModuleEntry>,
    modules: Vec<vk::ShaderModule>,
}

impl ShaderCatalog {
    /// Discover, recompile what is stale and verify completeness
    pub fn new(ctx: &VulkanContext, paths: &ShaderPaths) -> VulkanResult<Self> {
        validate_paths(paths)?;
        let entries = collect_modules(paths)?;

        let stale = stale_sources(&entries);
        if !stale.is_empty() {
            compile_batch(&paths.compile_script, &stale);
        }

        verify_complete(&entries)?;

        Ok(Self {
            device: ctx.device.clone(),
            entries,
            modules: Vec::new(),
        })
    }

    /// Look up a module by pass and optional name hint and create its
    /// shader stage pair.
    ///
    /// With a hint the base name is substring-matched (used when one pass
    /// hosts several named shaders, e.g. "outline" vs the default); without
    /// one, the first module of the pass in name order is returned.
    pub fn stages(&mut self, pass: PassTag, hint: Option<&str>) -> VulkanResult<ShaderStagePair> {
        let entry = self
            .entries
            .iter()
            .find(|m| {
                m.pass == pass && hint.map_or(true, |h| m.name.contains(h))
            })
            .ok_or_else(|| {
                VulkanError::Shader(format!(
                    "no shader module for pass {pass:?} matching {hint:?}"
                ))
            })?
            .clone();

        // On a partial failure the already-created module stays in
        // self.modules and is released by cleanup
        let vert = self.create_module(&entry.vert_spv)?;
        let frag = self.create_module(&entry.frag_spv)?;

        Ok(ShaderStagePair { vert, frag })
    }

    fn create_module(&mut self, spv: &Path) -> VulkanResult<vk::ShaderModule> {
        let bytes = fs::read(spv).map_err(|e| {
            VulkanError::Shader(format!("cannot read shader binary {}: {e}", spv.display()))
        })?;
        let code = ash::util::read_spv(&mut Cursor::new(&bytes)).map_err(|e| {
            VulkanError::Shader(format!("invalid SPIR-V in {}: {e}", spv.display()))
        })?;

        let info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe {
            self.device
                .create_shader_module(&info, None)
                .map_err(device_call("vkCreateShaderModule"))?
        };
        self.modules.push(module);
        Ok(module)
    }

    /// Destroy every shader module created through this catalog
    pub fn cleanup(&mut self) {
        for module in self.modules.drain(..) {
            unsafe {
                self.device.destroy_shader_module(module, None);
            }
        }
    }
}

/// Invoke the external compiler once for the whole stale batch.
///
/// A non-zero exit is a warning, not an error: the binary-existence check
/// that follows compilation is the real gate and will fail loudly if the
/// script produced nothing usable.
fn compile_batch(script: &Path, sources: &[PathBuf]) {
    let status = Command::new(script).args(sources).status();

    match status {
        Ok(status) if status.success() => {}
        Ok(status) => {
            log::warn!("shader compile script exited with {status}");
        }
        Err(e) => {
            log::warn!("shader compile script could not be run: {e}");
        }
    }
}

/// Every pass must end up with at least one complete module whose binaries
/// exist on disk.
fn verify_complete(modules: &[ShaderModuleEntry]) -> VulkanResult<()> {
    for pass in PassTag::ALL {
        let ok = modules.iter().any(|m| {
            m.pass == pass && m.is_complete() && m.vert_spv.is_file() && m.frag_spv.is_file()
        });
        if !ok {
            return Err(VulkanError::Shader(format!(
                "no complete shader module for pass {pass:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    struct TempTree {
        root: PathBuf,
    }

    impl TempTree {
        fn new(tag: &str) -> Self {
            let root = std::env::temp_dir().join(format!(
                "vrender-shaders-{tag}-{}",
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&root);
            for sub in ["first_pass", "second_pass", "include"] {
                fs::create_dir_all(root.join(sub)).unwrap();
            }
            File::create(root.join("compile.sh")).unwrap();
            Self { root }
        }

        fn paths(&self) -> ShaderPaths {
            ShaderPaths {
                root: self.root.clone(),
                include_dir: self.root.join("include"),
                compile_script: self.root.join("compile.sh"),
            }
        }

        fn write(&self, rel: &str, contents: &str) -> PathBuf {
            let path = self.root.join(rel);
            let mut file = File::create(&path).unwrap();
            file.write_all(contents.as_bytes()).unwrap();
            path
        }

        fn touch_newer(&self, rel: &str) {
            // Filesystem mtime granularity can swallow sub-second edits;
            // push the timestamp explicitly instead of sleeping.
            let path = self.root.join(rel);
            let newer = SystemTime::now() + std::time::Duration::from_secs(5);
            let file = File::options().append(true).open(&path).unwrap();
            file.set_modified(newer).unwrap();
        }
    }

    impl Drop for TempTree {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn include_parsing_recognizes_quoted_paths_only() {
        let source = r#"
#version 450
#include "lighting.glsl"
  #include "common/math.glsl"
#include <ignored.glsl>
// #include "commented.glsl" is not picked up
"#;
        let includes = parse_includes(source);
        assert_eq!(includes, vec!["lighting.glsl", "common/math.glsl"]);
    }

    #[test]
    fn modules_are_grouped_by_stem_and_sorted() {
        let tree = TempTree::new("grouping");
        tree.write("first_pass/default.vert", "");
        tree.write("first_pass/default.frag", "");
        tree.write("first_pass/outline.vert", "");
        tree.write("first_pass/outline.frag", "");
        tree.write("first_pass/default.vert.spv", "");
        tree.write("second_pass/composition.vert", "");
        tree.write("second_pass/composition.frag", "");

        let modules = collect_modules(&tree.paths()).unwrap();
        let names: Vec<(&str, PassTag)> = modules
            .iter()
            .map(|m| (m.name.as_str(), m.pass))
            .collect();
        assert_eq!(
            names,
            vec![
                ("default", PassTag::First),
                ("outline", PassTag::First),
                ("composition", PassTag::Second),
            ]
        );
    }

    #[test]
    fn missing_binary_marks_module_stale() {
        let tree = TempTree::new("missing-binary");
        tree.write("first_pass/default.vert", "");
        tree.write("first_pass/default.frag", "");

        let modules = collect_modules(&tree.paths()).unwrap();
        let stale = stale_sources(&modules);
        assert_eq!(stale.len(), 2);
    }

    #[test]
    fn up_to_date_binaries_are_not_recompiled() {
        let tree = TempTree::new("fresh");
        tree.write("first_pass/default.vert", "");
        tree.write("first_pass/default.frag", "");
        tree.write("first_pass/default.vert.spv", "spv");
        tree.write("first_pass/default.frag.spv", "spv");
        tree.touch_newer("first_pass/default.vert.spv");
        tree.touch_newer("first_pass/default.frag.spv");

        let modules = collect_modules(&tree.paths()).unwrap();
        assert!(stale_sources(&modules).is_empty());
    }

    #[test]
    fn touched_source_triggers_recompilation() {
        let tree = TempTree::new("touched-src");
        tree.write("first_pass/default.vert", "");
        tree.write("first_pass/default.frag", "");
        tree.write("first_pass/default.vert.spv", "spv");
        tree.write("first_pass/default.frag.spv", "spv");
        tree.touch_newer("first_pass/default.frag");

        let modules = collect_modules(&tree.paths()).unwrap();
        assert_eq!(stale_sources(&modules).len(), 2);
    }

    #[test]
    fn touched_include_dependency_triggers_recompilation() {
        let tree = TempTree::new("touched-include");
        tree.write("first_pass/default.vert", "#include \"lighting.glsl\"\n");
        tree.write("first_pass/default.frag", "");
        tree.write("include/lighting.glsl", "");
        tree.write("first_pass/default.vert.spv", "spv");
        tree.write("first_pass/default.frag.spv", "spv");
        tree.touch_newer("include/lighting.glsl");

        let modules = collect_modules(&tree.paths()).unwrap();
        assert_eq!(stale_sources(&modules).len(), 2);
    }

    #[test]
    fn touching_an_unrelated_file_does_not_trigger_recompilation() {
        let tree = TempTree::new("unrelated");
        tree.write("first_pass/default.vert", "");
        tree.write("first_pass/default.frag", "");
        tree.write("first_pass/default.vert.spv", "spv");
        tree.write("first_pass/default.frag.spv", "spv");
        tree.touch_newer("first_pass/default.vert.spv");
        tree.touch_newer("first_pass/default.frag.spv");
        tree.write("include/unused.glsl", "");
        tree.touch_newer("include/unused.glsl");

        let modules = collect_modules(&tree.paths()).unwrap();
        assert!(stale_sources(&modules).is_empty());
    }
}
