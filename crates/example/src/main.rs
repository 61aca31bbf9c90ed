//! Example build pipeline CLI.
//!
//! Builds a handful of in-memory sources with every example plugin applied,
//! then prints the emitted files and a per-tap profile.
//!
//! # Usage
//!
//! ```bash
//! tapestry-demo [--json] [--verbose]
//! ```

use example::{Compiler, Plugin};
use example::plugins::{
    BannerPlugin, CleanPlugin, DedupePlugin, JsonLoaderPlugin, LoggingPlugin, ManifestPlugin,
    MemoryEmitPlugin, MinifyPlugin, NoEmitOnEmptyPlugin, ProfilePlugin, StatsPlugin,
    TextLoaderPlugin,
};
use tapestry_core_plugins::{TapTimings, TracingFormat, TracingSetup};
use tracing::Level;

fn sources() -> Vec<(String, String)> {
    [
        ("src/index.js", "// entry point\nimport config from './config.json';\n\n    start(config);\n"),
        ("src/legacy.js", "// entry point\nimport config from './config.json';\n\nstart(config);"),
        ("src/config.json", "{ \"port\": 8080, \"debug\": false }"),
        ("src/README.txt", "Built with \"tapestry\"."),
    ]
    .into_iter()
    .map(|(path, source)| (path.to_owned(), source.to_owned()))
    .collect()
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let json = args.iter().any(|arg| arg == "--json");
    let verbose = args.iter().any(|arg| arg == "--verbose");

    TracingSetup::new()
        .with_level(if verbose { Level::DEBUG } else { Level::INFO })
        .with_format(if json { TracingFormat::Json } else { TracingFormat::Compact })
        .init();

    let compiler = Compiler::new("demo");
    let timings = TapTimings::new();
    let logging = LoggingPlugin::new(Level::DEBUG);
    let profile = ProfilePlugin::new(&timings);
    let banner = BannerPlugin::new("/*! demo | built with tapestry */");

    let plugins: [&dyn Plugin; 12] = [
        &logging,
        &profile,
        &CleanPlugin,
        &JsonLoaderPlugin,
        &TextLoaderPlugin,
        &banner,
        &MinifyPlugin,
        &DedupePlugin,
        &NoEmitOnEmptyPlugin,
        &MemoryEmitPlugin,
        &ManifestPlugin,
        &StatsPlugin,
    ];
    for plugin in plugins {
        if let Err(e) = compiler.apply(plugin) {
            eprintln!("Error: {} failed to apply: {e}", plugin.name());
            std::process::exit(1);
        }
    }

    if let Err(e) = compiler.run(sources()).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    for (name, content) in compiler.outputs() {
        println!("── {name} ──\n{content}\n");
    }

    if json {
        match timings.to_json() {
            Ok(report) => println!("{report}"),
            Err(e) => eprintln!("Error: cannot serialize profile: {e}"),
        }
    } else {
        println!("Slowest taps:");
        for tap in timings.slowest_taps(5) {
            println!("  {:<12} {:<20} {:>4}x {:?}", tap.hook, tap.tap, tap.calls, tap.total);
        }
    }
}
