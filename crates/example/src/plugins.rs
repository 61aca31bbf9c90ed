//! Plugins for the example [`Compiler`].
//!
//! Each plugin taps one or more [`CompilerHooks`](crate::CompilerHooks) and
//! together they make up a small bundler: loaders, transforms, an optimizer,
//! output and diagnostics.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tapestry_core_plugins::{ProfilingInterceptor, TapTimings, TracingInterceptor};
use tapestry_hooks::{HookError, HookMapInterceptor, TapOptions, TapResult};
use tracing::Level;

use crate::{Compiler, Plugin};

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostics
// ─────────────────────────────────────────────────────────────────────────────

/// Logs every hook invocation through [`TracingInterceptor`].
#[derive(Debug, Clone)]
pub struct LoggingPlugin {
    level: Level,
}

impl LoggingPlugin {
    /// Logs at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Plugin for LoggingPlugin {
    fn name(&self) -> &'static str {
        "LoggingPlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        let tracer = TracingInterceptor::new().with_level(self.level);
        let hooks = compiler.hooks();
        tracer.attach(&hooks.before_run)?;
        tracer.attach(&hooks.transform)?;
        tracer.attach(&hooks.optimize)?;
        tracer.attach(&hooks.should_emit)?;
        tracer.attach(&hooks.emit)?;
        tracer.attach(&hooks.done)?;

        hooks.load.for_each_existing(|_, hook| {
            if let Err(err) = tracer.attach(hook) {
                tracing::warn!(error = %err, "could not trace loader");
            }
        });
        hooks.load.intercept(
            HookMapInterceptor::new("logging").on_factory(move |_, hook| {
                if let Err(err) = tracer.attach(&hook) {
                    tracing::warn!(error = %err, "could not trace loader");
                }
                hook
            }),
        );
        Ok(())
    }
}

/// Collects per-tap timings through [`ProfilingInterceptor`].
#[derive(Debug, Clone, Default)]
pub struct ProfilePlugin {
    timings: TapTimings,
}

impl ProfilePlugin {
    /// Reports into `timings`.
    #[must_use]
    pub fn new(timings: &TapTimings) -> Self {
        Self {
            timings: timings.clone(),
        }
    }
}

impl Plugin for ProfilePlugin {
    fn name(&self) -> &'static str {
        "ProfilePlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        let profiler = ProfilingInterceptor::new(&self.timings);
        let hooks = compiler.hooks();
        profiler.attach(&hooks.before_run)?;
        profiler.attach(&hooks.transform)?;
        profiler.attach(&hooks.optimize)?;
        profiler.attach(&hooks.should_emit)?;
        profiler.attach(&hooks.emit)?;
        profiler.attach(&hooks.done)?;

        hooks.load.for_each_existing(|_, hook| {
            if let Err(err) = profiler.attach(hook) {
                tracing::warn!(error = %err, "could not profile loader");
            }
        });
        hooks.load.intercept(
            HookMapInterceptor::new("profiling").on_factory(move |_, hook| {
                if let Err(err) = profiler.attach(&hook) {
                    tracing::warn!(error = %err, "could not profile loader");
                }
                hook
            }),
        );
        Ok(())
    }
}

/// Logs the final [`Stats`](crate::Stats) as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsPlugin;

impl Plugin for StatsPlugin {
    fn name(&self) -> &'static str {
        "StatsPlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        compiler.hooks().done.tap("StatsPlugin", |(stats,)| {
            let json = serde_json::to_string(stats)?;
            tracing::info!(stats = %json, "build finished");
            Ok(None)
        })?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

/// Empties the output directory before every build.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanPlugin;

impl Plugin for CleanPlugin {
    fn name(&self) -> &'static str {
        "CleanPlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        let output = compiler.output_fs();
        compiler.hooks().before_run.tap_promise("CleanPlugin", move |(name,)| {
            let output = Arc::clone(&output);
            async move {
                let removed = {
                    let mut files = output.lock();
                    let removed = files.len();
                    files.clear();
                    removed
                };
                tracing::debug!(compiler = %name, removed, "output cleaned");
                Ok(None)
            }
        })?;
        Ok(())
    }
}

/// Turns `.json` files into ES modules.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLoaderPlugin;

impl Plugin for JsonLoaderPlugin {
    fn name(&self) -> &'static str {
        "JsonLoaderPlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        compiler
            .hooks()
            .load
            .for_key(&"json".to_owned())
            .tap_promise("JsonLoaderPlugin", |(path, source)| async move {
                json_module(&path, &source)
            })?;
        Ok(())
    }
}

fn json_module(path: &str, source: &str) -> TapResult<String> {
    let value: serde_json::Value =
        serde_json::from_str(source).map_err(|err| format!("{path}: {err}"))?;
    Ok(Some(format!("export default {value};")))
}

/// Turns `.txt` files into string exports. Reports through a continuation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoaderPlugin;

impl Plugin for TextLoaderPlugin {
    fn name(&self) -> &'static str {
        "TextLoaderPlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        compiler
            .hooks()
            .load
            .for_key(&"txt".to_owned())
            .tap_callback("TextLoaderPlugin", |(_, source), done| {
                match serde_json::to_string(&source) {
                    Ok(literal) => done.resolve(Some(format!("export default {literal};"))),
                    Err(err) => done.fail(err),
                }
            })?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transforms
// ─────────────────────────────────────────────────────────────────────────────

/// Prepends a banner comment. Runs after the default stage so later
/// transforms cannot strip it.
#[derive(Debug, Clone)]
pub struct BannerPlugin {
    banner: String,
}

impl BannerPlugin {
    /// Prepends `banner` to every module.
    #[must_use]
    pub fn new(banner: impl Into<String>) -> Self {
        Self {
            banner: banner.into(),
        }
    }
}

impl Plugin for BannerPlugin {
    fn name(&self) -> &'static str {
        "BannerPlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        let banner = self.banner.clone();
        compiler.hooks().transform.tap(
            TapOptions::new("BannerPlugin").stage(10),
            move |(source, _)| Ok(Some(format!("{banner}\n{source}"))),
        )?;
        Ok(())
    }
}

/// Drops comment lines, blank lines and indentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyPlugin;

impl Plugin for MinifyPlugin {
    fn name(&self) -> &'static str {
        "MinifyPlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        compiler.hooks().transform.tap("MinifyPlugin", |(source, _)| {
            let minified = source
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with("//"))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Some(minified))
        })?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Optimization and output
// ─────────────────────────────────────────────────────────────────────────────

/// Removes modules whose source duplicates an earlier module, one per
/// optimization pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupePlugin;

impl Plugin for DedupePlugin {
    fn name(&self) -> &'static str {
        "DedupePlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        compiler.hooks().optimize.tap("DedupePlugin", |(graph,)| {
            let mut modules = graph.lock();
            let duplicate = (1..modules.len())
                .find(|&later| modules[..later].iter().any(|m| m.source == modules[later].source));
            Ok(duplicate.map(|index| {
                let removed = modules.remove(index);
                tracing::debug!(path = %removed.path, "duplicate module removed");
            }))
        })?;
        Ok(())
    }
}

/// Vetoes emitting when the build has no modules.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmitOnEmptyPlugin;

impl Plugin for NoEmitOnEmptyPlugin {
    fn name(&self) -> &'static str {
        "NoEmitOnEmptyPlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        compiler
            .hooks()
            .should_emit
            .tap("NoEmitOnEmptyPlugin", |(modules,)| Ok((*modules == 0).then_some(false)))?;
        Ok(())
    }
}

/// Writes every asset to the in-memory output directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryEmitPlugin;

impl Plugin for MemoryEmitPlugin {
    fn name(&self) -> &'static str {
        "MemoryEmitPlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        let output = compiler.output_fs();
        compiler.hooks().emit.tap_promise("MemoryEmitPlugin", move |(assets,)| {
            let output = Arc::clone(&output);
            async move {
                for asset in assets.iter() {
                    tokio::task::yield_now().await;
                    output.lock().insert(asset.name.clone(), asset.content.clone());
                }
                Ok(None)
            }
        })?;
        Ok(())
    }
}

/// Writes `manifest.json` listing every asset, from a spawned task that
/// reports back through a continuation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestPlugin;

impl Plugin for ManifestPlugin {
    fn name(&self) -> &'static str {
        "ManifestPlugin"
    }

    fn apply(&self, compiler: &Compiler) -> Result<(), HookError> {
        let output = compiler.output_fs();
        compiler.hooks().emit.tap_callback("ManifestPlugin", move |(assets,), done| {
            let output = Arc::clone(&output);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                let manifest = json!({
                    "assets": assets
                        .iter()
                        .map(|asset| json!({ "name": asset.name, "size": asset.content.len() }))
                        .collect::<Vec<_>>(),
                });
                match serde_json::to_string_pretty(&manifest) {
                    Ok(text) => {
                        output.lock().insert("manifest.json".to_owned(), text);
                        done.done();
                    }
                    Err(err) => done.fail(err),
                }
            });
        })?;
        Ok(())
    }
}
