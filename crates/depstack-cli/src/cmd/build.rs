//! `depstack build` - drive the package pipeline.

use anyhow::Result;
use depstack_core::pipeline::Pipeline;

use crate::config;
use crate::BuildArgs;

/// Build the configured chain (or a named subset) in declaration order.
pub fn run(args: &BuildArgs) -> Result<()> {
    let table = config::packages(&args.install_root);
    let selected = if args.packages.is_empty() {
        table
    } else {
        config::select(&table, &args.packages)?
    };

    tracing::info!(
        packages = selected.len(),
        build_root = %args.build_root.display(),
        install_root = %args.install_root.display(),
        "starting build"
    );

    let pipeline = Pipeline::new(&args.build_root, &args.install_root, args.ccache_dir.clone())
        .run_tests(args.run_tests);
    pipeline.build_all(&selected)?;

    // unbound ships a trust-anchor tool that must be primed once after
    // install; its expected first-run failure is tolerated by the runner.
    if selected.iter().any(|p| p.name == "unbound") {
        pipeline.bootstrap_anchor()?;
    }

    println!(
        "built {} package(s) into {}",
        selected.len(),
        args.install_root.display()
    );
    Ok(())
}
