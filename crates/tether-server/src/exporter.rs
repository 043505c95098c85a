use std::sync::Arc;

use tether_core::{
    CapabilityProxy, ExportDescriptor, ExportError, ObjectExporter, RemoteService,
    ServiceAddress, ServiceDescriptor, StubEndpoint,
};
use tether_registry::{RegistryHandles, RegistryMode};

/// A service that made it into the registry.
#[derive(Debug, Clone)]
pub struct ExportedService {
    pub descriptor: ServiceDescriptor,
    pub endpoint: StubEndpoint,
    pub registry_mode: RegistryMode,
}

impl ExportedService {
    pub fn address(&self) -> ServiceAddress {
        self.descriptor.address()
    }
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub exported: Vec<ExportedService>,
    pub failed: Vec<(String, ExportError)>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Declared {
    service: Arc<dyn RemoteService>,
    descriptor: ExportDescriptor,
}

/// Publishes local implementations into registries.
///
/// Services are first declared, then exported together by
/// [`activate`](Self::activate) once every declaration is known.
pub struct ServiceExporter {
    registries: Arc<RegistryHandles>,
    objects: Arc<dyn ObjectExporter>,
    host: String,
    declared: Vec<Declared>,
    exported: Vec<ExportedService>,
}

impl ServiceExporter {
    pub fn new(
        registries: Arc<RegistryHandles>,
        objects: Arc<dyn ObjectExporter>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            registries,
            objects,
            host: host.into(),
            declared: Vec::new(),
            exported: Vec::new(),
        }
    }

    /// Host advertised in every stub this exporter publishes.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn declare(
        &mut self,
        service: Arc<dyn RemoteService>,
        descriptor: ExportDescriptor,
    ) -> &mut Self {
        self.declared.push(Declared {
            service,
            descriptor,
        });
        self
    }

    pub fn exported(&self) -> &[ExportedService] {
        &self.exported
    }

    /// Exports everything declared so far. A failing service is logged and
    /// skipped; the rest are still exported.
    pub async fn activate(&mut self) -> ExportReport {
        let declared = std::mem::take(&mut self.declared);
        if declared.is_empty() {
            tracing::warn!("no services declared for export");
        }

        let mut report = ExportReport::default();
        for Declared {
            service,
            descriptor,
        } in declared
        {
            let name = descriptor.resolve_name(service.interface());
            match self.export(service, &descriptor).await {
                Ok(exported) => {
                    self.exported.push(exported.clone());
                    report.exported.push(exported);
                }
                Err(e) => {
                    tracing::warn!(
                        service = %name,
                        error = %e,
                        "export failed, continuing with remaining services"
                    );
                    metrics::counter!("tether_export_failures_total", "service" => name.clone())
                        .increment(1);
                    report.failed.push((name, e));
                }
            }
        }
        report
    }

    /// Exports one service: registry first, then the object, then the
    /// registry entry (rebind, so a previous run's entry is replaced).
    pub async fn export(
        &self,
        service: Arc<dyn RemoteService>,
        export: &ExportDescriptor,
    ) -> Result<ExportedService, ExportError> {
        let descriptor = ServiceDescriptor::new(
            export,
            service.interface(),
            self.host.clone(),
            !service.implements_liveness(),
        );
        if descriptor.export_port == 0 {
            return Err(ExportError::InvalidDescriptor {
                name: descriptor.name,
                reason: "export port must be fixed, not auto-assigned".to_string(),
            });
        }

        let registry = self.registries.obtain(descriptor.registry_port).await?;

        let service = CapabilityProxy::wrap(service);
        let endpoint = self
            .objects
            .export(service, &descriptor.host, descriptor.export_port)
            .await
            .map_err(|source| ExportError::Bind {
                name: descriptor.name.clone(),
                port: descriptor.export_port,
                source,
            })?;

        if let Err(source) = registry.rebind(&descriptor.name, endpoint.clone()).await {
            self.objects.unexport(&endpoint).await;
            return Err(ExportError::Publish {
                name: descriptor.name,
                source,
            });
        }

        tracing::info!(
            service = %descriptor.name,
            address = %descriptor.address(),
            export_port = endpoint.port,
            registry = %registry.mode(),
            liveness_injected = descriptor.inject_liveness,
            "exported service"
        );
        metrics::counter!("tether_exports_total").increment(1);

        Ok(ExportedService {
            descriptor,
            endpoint,
            registry_mode: registry.mode(),
        })
    }

    /// Withdraws this process's registry entries and stops serving its
    /// objects. Entries already replaced by another export stay.
    pub async fn shutdown(&mut self) {
        for exported in self.exported.drain(..) {
            let name = &exported.descriptor.name;
            if let Some(registry) = self.registries.get(exported.descriptor.registry_port).await {
                match registry.withdraw(name, &exported.endpoint).await {
                    Ok(true) => tracing::debug!(service = %name, "withdrew registry entry"),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(
                            service = %name,
                            error = %e,
                            "could not withdraw registry entry"
                        )
                    }
                }
            }
            self.objects.unexport(&exported.endpoint).await;
        }
    }
}
