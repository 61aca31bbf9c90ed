//! Example plugin-driven build pipeline built with Tapestry.
//!
//! A [`Compiler`] owns one hook per pipeline step. It knows nothing about
//! loaders, minification or output: every behavior is contributed by a
//! [`Plugin`] that taps those hooks.
//!
//! # Pipeline
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────┐
//! │ before_run │──▶│ load.<ext>   │──▶│ transform │──▶│ optimize │
//! │ series     │   │ series bail  │   │ waterfall │   │ loop     │
//! └────────────┘   └──────────────┘   └───────────┘   └────┬─────┘
//!                                                          ▼
//!                       ┌──────┐   ┌──────────┐   ┌─────────────┐
//!                       │ done │◀──│ emit     │◀──│ should_emit │
//!                       │ sync │   │ parallel │   │ sync bail   │
//!                       └──────┘   └──────────┘   └─────────────┘
//! ```

mod compilation;
pub mod plugins;

pub use compilation::{Asset, Module, Stats};

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tapestry_hooks::{Hook, HookError, HookMap};

/// Modules shared with `optimize` taps, which edit the list in place.
pub type ModuleGraph = Arc<Mutex<Vec<Module>>>;

/// In-memory output directory.
pub type OutputFs = Arc<Mutex<BTreeMap<String, String>>>;

/// Something that extends a [`Compiler`] by tapping its hooks.
pub trait Plugin {
    /// Name used for logging.
    fn name(&self) -> &'static str;

    /// Registers this plugin's taps and interceptors.
    ///
    /// # Errors
    ///
    /// Returns the first registration error.
    fn apply(&self, compiler: &Compiler) -> Result<(), HookError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// CompilerHooks
// ─────────────────────────────────────────────────────────────────────────────

/// Every extension point of the pipeline.
pub struct CompilerHooks {
    /// Runs once before any file is loaded, with the compiler name.
    pub before_run: Hook<(Arc<str>,)>,
    /// Per-extension loaders; the first tap to return a value wins.
    pub load: HookMap<String, (String, String), String>,
    /// Threads `(source, path)` through every transform; the source is the
    /// value being threaded.
    pub transform: Hook<(String, String), String>,
    /// Repeats until no tap reports a change to the module graph.
    pub optimize: Hook<(ModuleGraph,)>,
    /// Any tap returning `false` suppresses emitting.
    pub should_emit: Hook<(usize,), bool>,
    /// Receives every asset at once; taps run concurrently.
    pub emit: Hook<(Arc<[Asset]>,)>,
    /// Runs once the build finished.
    pub done: Hook<(Stats,)>,
}

impl Default for CompilerHooks {
    fn default() -> Self {
        Self {
            before_run: Hook::async_series().named("before_run").with_params(["compiler"]),
            load: HookMap::new(|ext: &String| {
                Hook::async_series_bail()
                    .named(format!("load.{ext}"))
                    .with_params(["path", "source"])
            }),
            transform: Hook::async_series_waterfall()
                .named("transform")
                .with_params(["source", "path"]),
            optimize: Hook::sync_loop()
                .named("optimize")
                .with_params(["modules"])
                .with_max_loop_passes(64),
            should_emit: Hook::sync_bail().named("should_emit").with_params(["modules"]),
            emit: Hook::async_parallel().named("emit").with_params(["assets"]),
            done: Hook::sync().named("done").with_params(["stats"]),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compiler
// ─────────────────────────────────────────────────────────────────────────────

/// A build pipeline whose behavior comes entirely from plugins.
pub struct Compiler {
    name: String,
    hooks: CompilerHooks,
    output: OutputFs,
}

impl Compiler {
    /// Creates a compiler with no plugins applied.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: CompilerHooks::default(),
            output: OutputFs::default(),
        }
    }

    /// Returns the compiler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the pipeline hooks.
    #[must_use]
    pub fn hooks(&self) -> &CompilerHooks {
        &self.hooks
    }

    /// Returns the shared output directory that emit plugins write into.
    #[must_use]
    pub fn output_fs(&self) -> OutputFs {
        Arc::clone(&self.output)
    }

    /// Returns a copy of everything emitted so far.
    #[must_use]
    pub fn outputs(&self) -> BTreeMap<String, String> {
        self.output.lock().clone()
    }

    /// Applies a plugin.
    ///
    /// # Errors
    ///
    /// Returns the plugin's registration error.
    pub fn apply(&self, plugin: &dyn Plugin) -> Result<(), HookError> {
        tracing::debug!(compiler = %self.name, plugin = plugin.name(), "applying plugin");
        plugin.apply(self)
    }

    /// Builds `sources`, given as `(path, source)` pairs.
    ///
    /// Files whose extension has no loader keep their source unchanged.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure; nothing after it runs.
    pub async fn run(&self, sources: Vec<(String, String)>) -> Result<Stats, HookError> {
        self.hooks.before_run.call_async((Arc::from(self.name.as_str()),)).await?;

        let mut modules = Vec::with_capacity(sources.len());
        for (path, source) in sources {
            let ext = compilation::extension_of(&path).to_owned();
            let loaded = match self.hooks.load.get(&ext) {
                Some(loader) => loader.call_async((path.clone(), source.clone())).await?,
                None => None,
            };
            let source = self
                .hooks
                .transform
                .call_async((loaded.unwrap_or(source), path.clone()))
                .await?
                .unwrap_or_default();
            modules.push(Module { path, source });
        }

        let loaded = modules.len();
        let graph: ModuleGraph = Arc::new(Mutex::new(modules));
        self.hooks.optimize.call((Arc::clone(&graph),))?;
        let modules = std::mem::take(&mut *graph.lock());

        let mut stats = Stats {
            compiler: self.name.clone(),
            modules: modules.len(),
            removed: loaded.saturating_sub(modules.len()),
            ..Stats::default()
        };

        if self.hooks.should_emit.call((modules.len(),))? != Some(false) {
            let assets: Arc<[Asset]> = modules.iter().map(Asset::from).collect();
            stats.assets = assets.len();
            stats.emitted = true;
            self.hooks.emit.call_async((assets,)).await?;
        }

        self.hooks.done.call((stats.clone(),))?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{
        BannerPlugin, DedupePlugin, JsonLoaderPlugin, ManifestPlugin, MemoryEmitPlugin,
        MinifyPlugin, NoEmitOnEmptyPlugin,
    };

    fn sources() -> Vec<(String, String)> {
        vec![
            ("src/main.js".into(), "// entry\nrun();\n\n".into()),
            ("src/copy.js".into(), "// entry\nrun();\n\n".into()),
            ("src/config.json".into(), "{\"debug\":true}".into()),
        ]
    }

    fn compiler() -> Compiler {
        let compiler = Compiler::new("demo");
        let plugins: [&dyn Plugin; 7] = [
            &BannerPlugin::new("/* built by tapestry */"),
            &MinifyPlugin,
            &JsonLoaderPlugin,
            &DedupePlugin,
            &NoEmitOnEmptyPlugin,
            &MemoryEmitPlugin,
            &ManifestPlugin,
        ];
        for plugin in plugins {
            compiler.apply(plugin).unwrap();
        }
        compiler
    }

    #[tokio::test]
    async fn full_pipeline() {
        let compiler = compiler();
        let stats = compiler.run(sources()).await.unwrap();

        assert_eq!(
            stats,
            Stats {
                compiler: "demo".into(),
                modules: 2,
                removed: 1,
                assets: 2,
                emitted: true,
            }
        );

        let outputs = compiler.outputs();
        assert_eq!(
            outputs.get("main.js").map(String::as_str),
            Some("/* built by tapestry */\nrun();")
        );
        assert_eq!(
            outputs.get("config.js").map(String::as_str),
            Some("/* built by tapestry */\nexport default {\"debug\":true};")
        );
        assert!(outputs["manifest.json"].contains("config.js"));
        assert!(!outputs.contains_key("copy.js"));
    }

    #[tokio::test]
    async fn nothing_is_emitted_for_an_empty_build() {
        let compiler = compiler();
        let stats = compiler.run(Vec::new()).await.unwrap();
        assert!(!stats.emitted);
        assert!(compiler.outputs().is_empty());
    }

    #[tokio::test]
    async fn profiling_reaches_loaders_created_later() {
        use crate::plugins::{ProfilePlugin, TextLoaderPlugin};
        use tapestry_core_plugins::TapTimings;

        let compiler = Compiler::new("profiled");
        let timings = TapTimings::new();
        compiler.apply(&JsonLoaderPlugin).unwrap();
        compiler.apply(&ProfilePlugin::new(&timings)).unwrap();
        compiler.apply(&TextLoaderPlugin).unwrap();

        compiler
            .run(vec![
                ("a.json".into(), "[1]".into()),
                ("b.txt".into(), "hi".into()),
            ])
            .await
            .unwrap();

        assert_eq!(timings.tap("load.json", "JsonLoaderPlugin").unwrap().calls, 1);
        assert_eq!(timings.tap("load.txt", "TextLoaderPlugin").unwrap().calls, 1);
        assert_eq!(timings.hook("transform").unwrap().invocations, 2);
        assert_eq!(timings.hook("done").unwrap().invocations, 1);
    }

    #[tokio::test]
    async fn loader_failures_abort_the_build() {
        let compiler = Compiler::new("strict");
        compiler.apply(&JsonLoaderPlugin).unwrap();
        compiler.apply(&MemoryEmitPlugin).unwrap();

        let err = compiler
            .run(vec![("bad.json".into(), "{oops".into())])
            .await
            .unwrap_err();
        assert_eq!(err.tap_name(), Some("JsonLoaderPlugin"));
        assert!(compiler.outputs().is_empty());
    }

    #[tokio::test]
    async fn without_plugins_sources_pass_through() {
        let compiler = Compiler::new("bare");
        let stats = compiler.run(sources()).await.unwrap();
        assert_eq!((stats.modules, stats.assets), (3, 3));
        assert!(compiler.outputs().is_empty());
    }
}
