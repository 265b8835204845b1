//! Link driver.
//!
//! Runs every pass over one config, aggregates their diagnostics and decides
//! success. Independent passes keep running after errors so one run reports
//! as much as possible; only a fatal diagnostic stops the sequence.

use thiserror::Error;

use crate::aliases::assign_aliases;
use crate::diagnostics::{Channel, Diagnostic, Diagnostics, Severity};
use crate::flags::compute_flags;
use crate::linked::LinkedConfig;
use crate::model::Config;
use crate::resolve::resolve;
use crate::roles::link_roles;
use crate::search::{check_searches, mark_unique_searches};
use crate::source::SourceSet;
use crate::symbols::Namespace;
use crate::topology::{check_recursion, compute_topology};
use crate::unique::check_unique_sets;

/// Linking failed; carries every diagnostic gathered before stopping.
#[derive(Debug, Clone, Error)]
#[error("linking failed with {} error(s)", .diagnostics.error_count())]
pub struct LinkFailure {
    pub diagnostics: Diagnostics,
}

impl LinkFailure {
    fn new(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }
}

/// Link a config built in memory.
pub fn link(config: Config) -> Result<LinkedConfig, LinkFailure> {
    link_with(config, Diagnostics::default())
}

/// Link everything added to a source set, keeping its front-end diagnostics.
pub fn link_sources(sources: SourceSet) -> Result<LinkedConfig, LinkFailure> {
    let (config, diagnostics) = sources.finish();
    link_with(config, diagnostics)
}

/// Link a config, starting from diagnostics gathered earlier.
pub fn link_with(
    mut config: Config,
    mut diagnostics: Diagnostics,
) -> Result<LinkedConfig, LinkFailure> {
    let span = tracing::info_span!("link", structs = config.struct_count());
    let _guard = span.enter();

    if config.struct_count() == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            Channel::Resolve,
            None,
            "no structures in configuration",
        ));
        return Err(LinkFailure::new(diagnostics));
    }

    let names = Namespace::build(&config, &mut diagnostics);
    diagnostics.merge(resolve(&mut config, &names));
    diagnostics.merge(check_unique_sets(&config));
    diagnostics.merge(link_roles(&mut config, &names));
    abort_on_fatal(&diagnostics)?;

    let recursion = check_recursion(&config);
    let acyclic = recursion.is_ok();
    diagnostics.merge(recursion);
    abort_on_fatal(&diagnostics)?;

    let topology = if acyclic {
        diagnostics.merge(assign_aliases(&mut config));
        let topology = compute_topology(&config);
        for &id in &topology.order {
            config.strct_mut(id).height = topology.height(id);
        }
        Some(topology)
    } else {
        None
    };

    mark_unique_searches(&mut config);
    diagnostics.merge(check_searches(&config));
    abort_on_fatal(&diagnostics)?;

    let topology = match topology {
        Some(topology) if diagnostics.is_ok() => topology,
        _ => {
            tracing::info!(
                event = "link_failed",
                errors = diagnostics.error_count(),
                warnings = diagnostics.warning_count()
            );
            return Err(LinkFailure::new(diagnostics));
        }
    };

    compute_flags(&mut config, &topology.order);

    tracing::info!(
        event = "link_complete",
        structs = topology.summary.nodes,
        edges = topology.summary.edges,
        warnings = diagnostics.warning_count()
    );
    Ok(LinkedConfig::new(config, topology, diagnostics))
}

fn abort_on_fatal(diagnostics: &Diagnostics) -> Result<(), LinkFailure> {
    if diagnostics.has_fatal() {
        tracing::warn!(event = "link_aborted", errors = diagnostics.error_count());
        return Err(LinkFailure::new(diagnostics.clone()));
    }
    Ok(())
}
