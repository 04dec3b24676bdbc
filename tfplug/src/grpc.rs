//! gRPC service implementation
//!
//! `ProviderService` adapts a [`Provider`] to the generated `tfplugin6`
//! service trait. It converts wire values to framework types, creates a
//! fresh resource or data source for every request, and implements the
//! framework-side planning rules: schema defaults, unknown marking for
//! computed attributes and attribute plan modifiers.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::error::TfplugError;
use crate::plan_modifier::values_equal;
use crate::proto;
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderMetaSchemaRequest,
    ProviderMetadataRequest, ProviderSchemaRequest, ResourceFactory, StopProviderRequest,
    ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{
    Attribute, Block, DefaultRequest, ObjectNestingMode, PlanModifierRequest, Schema, StringKind,
    ValidatorRequest,
};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Deferred, DeferredReason,
    Diagnostic, DiagnosticSeverity, Dynamic, DynamicValue, ServerCapabilities,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

/// Serves a single provider instance over the plugin protocol.
pub struct ProviderService<P: Provider> {
    provider: Arc<RwLock<P>>,
    resources: Arc<HashMap<String, ResourceFactory>>,
    data_sources: Arc<HashMap<String, DataSourceFactory>>,
    provider_data: Arc<RwLock<ProviderData>>,
    ctx: Context,
}

impl<P: Provider + 'static> ProviderService<P> {
    pub fn new(provider: P) -> Self {
        let resources = provider.resources();
        let data_sources = provider.data_sources();
        Self {
            provider: Arc::new(RwLock::new(provider)),
            resources: Arc::new(resources),
            data_sources: Arc::new(data_sources),
            provider_data: Arc::new(RwLock::new(None)),
            ctx: Context::new(),
        }
    }

    /// Root context of the service. Cancelled by `StopProvider`.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    async fn request_context(&self) -> Context {
        self.ctx.child().await
    }

    async fn resource(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> std::result::Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self.resources.get(type_name).ok_or_else(|| {
            vec![Diagnostic::error(
                "Unknown resource type",
                format!("The provider does not implement the resource type {}", type_name),
            )]
        })?;

        let mut resource = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(resource)
    }

    async fn data_source(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> std::result::Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self.data_sources.get(type_name).ok_or_else(|| {
            vec![Diagnostic::error(
                "Unknown data source type",
                format!(
                    "The provider does not implement the data source type {}",
                    type_name
                ),
            )]
        })?;

        let mut data_source = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(ctx.clone(), ConfigureDataSourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(data_source)
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> proto::ProviderService for ProviderService<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> Result<Response<proto::get_metadata::Response>, Status> {
        let ctx = self.request_context().await;
        let provider = self.provider.read().await;
        let metadata = provider.metadata(ctx, ProviderMetadataRequest).await;

        let mut resources: Vec<_> = self.resources.keys().cloned().collect();
        resources.sort();
        let mut data_sources: Vec<_> = self.data_sources.keys().cloned().collect();
        data_sources.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities_to_proto(
                &metadata.server_capabilities,
            )),
            diagnostics: vec![],
            data_sources: data_sources
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
            functions: vec![],
            ephemeral_resources: vec![],
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> Result<Response<proto::get_provider_schema::Response>, Status> {
        let ctx = self.request_context().await;
        let provider = self.provider.read().await;
        let mut diagnostics = vec![];

        let schema = provider.schema(ctx.clone(), ProviderSchemaRequest).await;
        diagnostics.extend(schema.diagnostics);
        let meta = provider
            .meta_schema(ctx.clone(), ProviderMetaSchemaRequest)
            .await;
        diagnostics.extend(meta.diagnostics);
        let metadata = provider.metadata(ctx.clone(), ProviderMetadataRequest).await;
        drop(provider);

        let mut resource_schemas = HashMap::new();
        for (type_name, factory) in self.resources.iter() {
            let response = factory().schema(ctx.clone(), ResourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            resource_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        let mut data_source_schemas = HashMap::new();
        for (type_name, factory) in self.data_sources.iter() {
            let response = factory().schema(ctx.clone(), DataSourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            data_source_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        let provider_meta = meta
            .schema
            .as_ref()
            .map(schema_to_proto)
            .unwrap_or_else(empty_schema);

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&schema.schema)),
            resource_schemas,
            data_source_schemas,
            functions: HashMap::new(),
            ephemeral_resource_schemas: HashMap::new(),
            diagnostics: diagnostics_to_proto(&diagnostics),
            provider_meta: Some(provider_meta),
            server_capabilities: Some(server_capabilities_to_proto(
                &metadata.server_capabilities,
            )),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> Result<Response<proto::validate_provider_config::Response>, Status> {
        let ctx = self.request_context().await;
        let request = request.into_inner();
        let config = decode_value(request.config.as_ref())?;

        let provider = self.provider.read().await;
        let schema = provider.schema(ctx.clone(), ProviderSchemaRequest).await;
        let mut diagnostics = schema.diagnostics;
        validate_attributes(
            &schema.schema.block.attributes,
            &config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );
        let response = provider
            .validate(ctx, ValidateProviderConfigRequest { config })
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> Result<Response<proto::validate_resource_config::Response>, Status> {
        let ctx = self.request_context().await;
        let request = request.into_inner();
        let config = decode_value(request.config.as_ref())?;

        let resource = match self.resource(&ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return Ok(Response::new(proto::validate_resource_config::Response {
                    diagnostics: diagnostics_to_proto(&diagnostics),
                }))
            }
        };

        let schema = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
        let mut diagnostics = schema.diagnostics;
        validate_attributes(
            &schema.schema.block.attributes,
            &config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );
        let response = resource
            .validate(
                ctx,
                ValidateResourceConfigRequest {
                    type_name: request.type_name,
                    config,
                    client_capabilities: client_capabilities_from_proto(
                        request.client_capabilities,
                    ),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let ctx = self.request_context().await;
        let request = request.into_inner();
        let config = decode_value(request.config.as_ref())?;

        let data_source = match self.data_source(&ctx, &request.type_name).await {
            Ok(data_source) => data_source,
            Err(diagnostics) => {
                return Ok(Response::new(
                    proto::validate_data_resource_config::Response {
                        diagnostics: diagnostics_to_proto(&diagnostics),
                    },
                ))
            }
        };

        let schema = data_source.schema(ctx.clone(), DataSourceSchemaRequest).await;
        let mut diagnostics = schema.diagnostics;
        validate_attributes(
            &schema.schema.block.attributes,
            &config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );
        let response = data_source
            .validate(
                ctx,
                ValidateDataSourceConfigRequest {
                    type_name: request.type_name,
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(
            proto::validate_data_resource_config::Response {
                diagnostics: diagnostics_to_proto(&diagnostics),
            },
        ))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let ctx = self.request_context().await;
        let request = request.into_inner();

        let resource = match self.resource(&ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return Ok(Response::new(proto::upgrade_resource_state::Response {
                    upgraded_state: None,
                    diagnostics: diagnostics_to_proto(&diagnostics),
                }))
            }
        };
        let schema = resource.schema(ctx, ResourceSchemaRequest).await.schema;

        let raw = request.raw_state.unwrap_or_default();
        if raw.json.is_empty() {
            if !raw.flatmap.is_empty() {
                let diagnostics = vec![Diagnostic::error(
                    "Unsupported state format",
                    "Flatmap state from Terraform 0.11 and earlier cannot be upgraded",
                )];
                return Ok(Response::new(proto::upgrade_resource_state::Response {
                    upgraded_state: None,
                    diagnostics: diagnostics_to_proto(&diagnostics),
                }));
            }
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: Some(encode_value(&DynamicValue::null())?),
                diagnostics: vec![],
            }));
        }

        tracing::debug!(
            "Upgrading {} state from version {} to {}",
            request.type_name,
            request.version,
            schema.version
        );

        // Stored JSON may carry attributes that were removed from the schema
        // or lack ones that were added since.
        let state = DynamicValue::decode_json(&raw.json)?;
        let upgraded = schema.normalize(&state);

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_value(&upgraded)?),
            diagnostics: vec![],
        }))
    }

    async fn get_resource_identity_schemas(
        &self,
        _request: Request<proto::get_resource_identity_schemas::Request>,
    ) -> Result<Response<proto::get_resource_identity_schemas::Response>, Status> {
        Ok(Response::new(
            proto::get_resource_identity_schemas::Response {
                identity_schemas: HashMap::new(),
                diagnostics: vec![],
            },
        ))
    }

    async fn upgrade_resource_identity(
        &self,
        request: Request<proto::upgrade_resource_identity::Request>,
    ) -> Result<Response<proto::upgrade_resource_identity::Response>, Status> {
        let request = request.into_inner();
        let diagnostics = vec![unsupported(
            "Resource identity",
            &format!("{} does not define a resource identity", request.type_name),
        )];
        Ok(Response::new(proto::upgrade_resource_identity::Response {
            upgraded_identity: None,
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> Result<Response<proto::configure_provider::Response>, Status> {
        let ctx = self.request_context().await;
        let request = request.into_inner();
        let config = decode_value(request.config.as_ref())?;

        tracing::debug!(
            "Configuring provider for Terraform {}",
            request.terraform_version
        );

        let mut provider = self.provider.write().await;
        let response = provider
            .configure(
                ctx,
                ConfigureProviderRequest {
                    terraform_version: request.terraform_version,
                    config,
                    client_capabilities: client_capabilities_from_proto(
                        request.client_capabilities,
                    ),
                },
            )
            .await;
        drop(provider);

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(&response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> Result<Response<proto::read_resource::Response>, Status> {
        let ctx = self.request_context().await;
        let request = request.into_inner();
        let current_state = decode_value(request.current_state.as_ref())?;
        let provider_meta = decode_optional(request.provider_meta.as_ref())?;

        let resource = match self.resource(&ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return Ok(Response::new(proto::read_resource::Response {
                    new_state: request.current_state,
                    diagnostics: diagnostics_to_proto(&diagnostics),
                    private: request.private,
                    deferred: None,
                    new_identity: None,
                }))
            }
        };
        let schema = resource
            .schema(ctx.clone(), ResourceSchemaRequest)
            .await
            .schema;

        let response = resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: request.type_name.clone(),
                    current_state,
                    private: request.private,
                    provider_meta,
                    client_capabilities: client_capabilities_from_proto(
                        request.client_capabilities,
                    ),
                },
            )
            .await;

        let new_state = match response.new_state {
            Some(state) => schema.normalize(&state),
            None => {
                tracing::info!("{} no longer exists, removing from state", request.type_name);
                DynamicValue::null()
            }
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_value(&new_state)?),
            diagnostics: diagnostics_to_proto(&response.diagnostics),
            private: response.private,
            deferred: response.deferred.as_ref().map(deferred_to_proto),
            new_identity: None,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> Result<Response<proto::plan_resource_change::Response>, Status> {
        let ctx = self.request_context().await;
        let request = request.into_inner();
        let prior_state = decode_value(request.prior_state.as_ref())?;
        let proposed = decode_value(request.proposed_new_state.as_ref())?;
        let config = decode_value(request.config.as_ref())?;

        // Destroy plans need no provider logic.
        if proposed.is_null() {
            return Ok(Response::new(proto::plan_resource_change::Response {
                planned_state: Some(encode_value(&proposed)?),
                requires_replace: vec![],
                planned_private: request.prior_private,
                diagnostics: vec![],
                legacy_type_system: false,
                deferred: None,
                planned_identity: None,
            }));
        }

        let resource = match self.resource(&ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return Ok(Response::new(proto::plan_resource_change::Response {
                    planned_state: request.proposed_new_state,
                    requires_replace: vec![],
                    planned_private: request.prior_private,
                    diagnostics: diagnostics_to_proto(&diagnostics),
                    legacy_type_system: false,
                    deferred: None,
                    planned_identity: None,
                }))
            }
        };
        let schema = resource.schema(ctx, ResourceSchemaRequest).await.schema;

        let outcome = plan_change(&schema, &prior_state, &proposed, &config);

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_value(&outcome.planned_state)?),
            requires_replace: outcome.requires_replace.iter().map(path_to_proto).collect(),
            planned_private: request.prior_private,
            diagnostics: diagnostics_to_proto(&outcome.diagnostics),
            legacy_type_system: false,
            deferred: None,
            planned_identity: None,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> Result<Response<proto::apply_resource_change::Response>, Status> {
        let ctx = self.request_context().await;
        let request = request.into_inner();
        let prior_state = decode_value(request.prior_state.as_ref())?;
        let planned_state = decode_value(request.planned_state.as_ref())?;
        let config = decode_value(request.config.as_ref())?;
        let provider_meta = decode_optional(request.provider_meta.as_ref())?;

        let resource = match self.resource(&ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return Ok(Response::new(proto::apply_resource_change::Response {
                    new_state: request.prior_state,
                    private: request.planned_private,
                    diagnostics: diagnostics_to_proto(&diagnostics),
                    legacy_type_system: false,
                    new_identity: None,
                }))
            }
        };
        let schema = resource
            .schema(ctx.clone(), ResourceSchemaRequest)
            .await
            .schema;

        let (new_state, private, mut diagnostics) = if planned_state.is_null() {
            tracing::debug!("Deleting {}", request.type_name);
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: request.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_private: request.planned_private,
                        provider_meta,
                    },
                )
                .await;
            // A failed delete keeps the object in state.
            let state = if has_errors(&response.diagnostics) {
                prior_state
            } else {
                DynamicValue::null()
            };
            (state, vec![], response.diagnostics)
        } else if prior_state.is_null() {
            tracing::debug!("Creating {}", request.type_name);
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: request.type_name.clone(),
                        planned_state,
                        config,
                        planned_private: request.planned_private,
                        provider_meta,
                    },
                )
                .await;
            (
                schema.normalize(&response.new_state),
                response.private,
                response.diagnostics,
            )
        } else {
            tracing::debug!("Updating {}", request.type_name);
            let response = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: request.type_name.clone(),
                        prior_state,
                        planned_state,
                        config,
                        planned_private: request.planned_private,
                        provider_meta,
                    },
                )
                .await;
            (
                schema.normalize(&response.new_state),
                response.private,
                response.diagnostics,
            )
        };

        let new_state = if new_state.value.is_wholly_known() {
            new_state
        } else if has_errors(&diagnostics) {
            DynamicValue::new(unknowns_to_null(&new_state.value))
        } else {
            diagnostics.push(Diagnostic::error(
                "Provider returned invalid result object after apply",
                format!(
                    "The {} state after apply still contains unknown values",
                    request.type_name
                ),
            ));
            DynamicValue::new(unknowns_to_null(&new_state.value))
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_value(&new_state)?),
            private,
            diagnostics: diagnostics_to_proto(&diagnostics),
            legacy_type_system: false,
            new_identity: None,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> Result<Response<proto::import_resource_state::Response>, Status> {
        let ctx = self.request_context().await;
        let request = request.into_inner();

        let resource = match self.resource(&ctx, &request.type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return Ok(Response::new(proto::import_resource_state::Response {
                    imported_resources: vec![],
                    diagnostics: diagnostics_to_proto(&diagnostics),
                    deferred: None,
                }))
            }
        };
        let schema = resource
            .schema(ctx.clone(), ResourceSchemaRequest)
            .await
            .schema;

        let response = resource
            .import_state(
                ctx,
                ImportResourceStateRequest {
                    type_name: request.type_name,
                    id: request.id,
                    client_capabilities: client_capabilities_from_proto(
                        request.client_capabilities,
                    ),
                },
            )
            .await;

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode_value(&schema.normalize(&imported.state))?),
                private: imported.private,
                identity: None,
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(&response.diagnostics),
            deferred: response.deferred.as_ref().map(deferred_to_proto),
        }))
    }

    async fn move_resource_state(
        &self,
        request: Request<proto::move_resource_state::Request>,
    ) -> Result<Response<proto::move_resource_state::Response>, Status> {
        let request = request.into_inner();
        let diagnostics = vec![unsupported(
            "Moving resource state",
            &format!(
                "Cannot move {} state into {}",
                request.source_type_name, request.target_type_name
            ),
        )];
        Ok(Response::new(proto::move_resource_state::Response {
            target_state: None,
            diagnostics: diagnostics_to_proto(&diagnostics),
            target_private: vec![],
            target_identity: None,
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> Result<Response<proto::read_data_source::Response>, Status> {
        let ctx = self.request_context().await;
        let request = request.into_inner();
        let config = decode_value(request.config.as_ref())?;
        let provider_meta = decode_optional(request.provider_meta.as_ref())?;

        let data_source = match self.data_source(&ctx, &request.type_name).await {
            Ok(data_source) => data_source,
            Err(diagnostics) => {
                return Ok(Response::new(proto::read_data_source::Response {
                    state: None,
                    diagnostics: diagnostics_to_proto(&diagnostics),
                    deferred: None,
                }))
            }
        };
        let schema = data_source
            .schema(ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;

        let response = data_source
            .read(
                ctx,
                ReadDataSourceRequest {
                    type_name: request.type_name,
                    config,
                    provider_meta,
                    client_capabilities: client_capabilities_from_proto(
                        request.client_capabilities,
                    ),
                },
            )
            .await;

        let state = if has_errors(&response.diagnostics) {
            DynamicValue::new(unknowns_to_null(&response.state.value))
        } else {
            schema.normalize(&response.state)
        };

        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_value(&state)?),
            diagnostics: diagnostics_to_proto(&response.diagnostics),
            deferred: response.deferred.as_ref().map(deferred_to_proto),
        }))
    }

    async fn validate_ephemeral_resource_config(
        &self,
        request: Request<proto::validate_ephemeral_resource_config::Request>,
    ) -> Result<Response<proto::validate_ephemeral_resource_config::Response>, Status> {
        let type_name = request.into_inner().type_name;
        Ok(Response::new(
            proto::validate_ephemeral_resource_config::Response {
                diagnostics: diagnostics_to_proto(&[unsupported_ephemeral(&type_name)]),
            },
        ))
    }

    async fn open_ephemeral_resource(
        &self,
        request: Request<proto::open_ephemeral_resource::Request>,
    ) -> Result<Response<proto::open_ephemeral_resource::Response>, Status> {
        let type_name = request.into_inner().type_name;
        Ok(Response::new(proto::open_ephemeral_resource::Response {
            diagnostics: diagnostics_to_proto(&[unsupported_ephemeral(&type_name)]),
            renew_at: None,
            result: None,
            private: None,
            deferred: None,
        }))
    }

    async fn renew_ephemeral_resource(
        &self,
        request: Request<proto::renew_ephemeral_resource::Request>,
    ) -> Result<Response<proto::renew_ephemeral_resource::Response>, Status> {
        let type_name = request.into_inner().type_name;
        Ok(Response::new(proto::renew_ephemeral_resource::Response {
            diagnostics: diagnostics_to_proto(&[unsupported_ephemeral(&type_name)]),
            renew_at: None,
            private: None,
        }))
    }

    async fn close_ephemeral_resource(
        &self,
        request: Request<proto::close_ephemeral_resource::Request>,
    ) -> Result<Response<proto::close_ephemeral_resource::Response>, Status> {
        let type_name = request.into_inner().type_name;
        Ok(Response::new(proto::close_ephemeral_resource::Response {
            diagnostics: diagnostics_to_proto(&[unsupported_ephemeral(&type_name)]),
        }))
    }

    async fn get_functions(
        &self,
        _request: Request<proto::get_functions::Request>,
    ) -> Result<Response<proto::get_functions::Response>, Status> {
        Ok(Response::new(proto::get_functions::Response {
            functions: HashMap::new(),
            diagnostics: vec![],
        }))
    }

    async fn call_function(
        &self,
        request: Request<proto::call_function::Request>,
    ) -> Result<Response<proto::call_function::Response>, Status> {
        let name = request.into_inner().name;
        Ok(Response::new(proto::call_function::Response {
            result: None,
            error: Some(proto::FunctionError {
                text: format!("Function {} is not implemented by this provider", name),
                function_argument: None,
            }),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> Result<Response<proto::stop_provider::Response>, Status> {
        tracing::info!("Stop requested, cancelling in-flight operations");
        let ctx = self.request_context().await;
        let provider = self.provider.read().await;
        let response = provider.stop(ctx, StopProviderRequest).await;
        self.ctx.cancel();

        Ok(Response::new(proto::stop_provider::Response {
            error: response.error.unwrap_or_default(),
        }))
    }
}

// Values missing from a parent object read as null.
static NULL: Dynamic = Dynamic::Null;

fn attr_value<'a>(value: &'a Dynamic, name: &str) -> &'a Dynamic {
    match value {
        Dynamic::Map(map) => map.get(name).unwrap_or(&NULL),
        _ => &NULL,
    }
}

fn elem_value(value: &Dynamic, idx: usize) -> &Dynamic {
    match value {
        Dynamic::List(items) => items.get(idx).unwrap_or(&NULL),
        _ => &NULL,
    }
}

/// Result of planning a create or update.
#[derive(Debug)]
pub struct PlanOutcome {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Computes the planned state for a non-destroy change.
///
/// Defaults are applied to attributes left null in configuration. When the
/// resource is new or the plan differs from the prior state, computed
/// attributes without a configured value become unknown. Plan modifiers run
/// last and may restore prior values or request replacement.
pub fn plan_change(
    schema: &Schema,
    prior_state: &DynamicValue,
    proposed: &DynamicValue,
    config: &DynamicValue,
) -> PlanOutcome {
    let attributes = &schema.block.attributes;
    let root = AttributePath::root();
    let created = prior_state.is_null();

    let mut planned = schema.normalize(proposed).value;
    apply_defaults(attributes, &config.value, &mut planned, &root);

    if created || !values_equal(&planned, &prior_state.value) {
        mark_computed_unknown(attributes, &config.value, &mut planned, &root);
    }

    let mut outcome = PlanOutcome {
        planned_state: DynamicValue::null(),
        requires_replace: vec![],
        diagnostics: vec![],
    };
    run_plan_modifiers(
        attributes,
        &config.value,
        &prior_state.value,
        &mut planned,
        &root,
        created,
        &mut outcome,
    );
    outcome.planned_state = DynamicValue::new(planned);
    outcome
}

struct NestedChild<'a> {
    config: &'a Dynamic,
    prior: &'a Dynamic,
    planned: &'a mut Dynamic,
    path: AttributePath,
}

/// Pairs every nested object in `planned` with its configuration and prior
/// counterparts. List and set elements are matched by position.
fn nested_children<'a>(
    nesting: ObjectNestingMode,
    config: &'a Dynamic,
    prior: &'a Dynamic,
    planned: &'a mut Dynamic,
    path: &AttributePath,
) -> Vec<NestedChild<'a>> {
    match nesting {
        ObjectNestingMode::Single => {
            if !matches!(planned, Dynamic::Map(_)) {
                return vec![];
            }
            vec![NestedChild {
                config,
                prior,
                planned,
                path: path.clone(),
            }]
        }
        ObjectNestingMode::List | ObjectNestingMode::Set => match planned {
            Dynamic::List(items) => items
                .iter_mut()
                .enumerate()
                .map(|(i, item)| NestedChild {
                    config: elem_value(config, i),
                    prior: elem_value(prior, i),
                    planned: item,
                    path: path.clone().index(i as i64),
                })
                .collect(),
            _ => vec![],
        },
        ObjectNestingMode::Map => match planned {
            Dynamic::Map(map) => map
                .iter_mut()
                .map(|(key, item)| NestedChild {
                    config: attr_value(config, key),
                    prior: attr_value(prior, key),
                    planned: item,
                    path: path.clone().key(key),
                })
                .collect(),
            _ => vec![],
        },
    }
}

fn nested_config_children<'a>(
    nesting: ObjectNestingMode,
    config: &'a Dynamic,
    path: &AttributePath,
) -> Vec<(&'a Dynamic, AttributePath)> {
    match (nesting, config) {
        (ObjectNestingMode::Single, Dynamic::Map(_)) => vec![(config, path.clone())],
        (ObjectNestingMode::List | ObjectNestingMode::Set, Dynamic::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (item, path.clone().index(i as i64)))
            .collect(),
        (ObjectNestingMode::Map, Dynamic::Map(map)) => map
            .iter()
            .map(|(key, item)| (item, path.clone().key(key)))
            .collect(),
        _ => vec![],
    }
}

fn apply_defaults(
    attributes: &[Attribute],
    config: &Dynamic,
    planned: &mut Dynamic,
    path: &AttributePath,
) {
    let Dynamic::Map(map) = planned else {
        return;
    };

    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let config_value = attr_value(config, &attr.name);
        let slot = map.entry(attr.name.clone()).or_insert(Dynamic::Null);

        if config_value.is_null() {
            if let Some(default) = &attr.default {
                *slot = default
                    .default_value(DefaultRequest { path: attr_path })
                    .value
                    .value;
                continue;
            }
        }

        if let Some(nested) = &attr.nested_type {
            for child in nested_children(nested.nesting, config_value, &NULL, slot, &attr_path) {
                apply_defaults(&nested.attributes, child.config, child.planned, &child.path);
            }
        }
    }
}

fn mark_computed_unknown(
    attributes: &[Attribute],
    config: &Dynamic,
    planned: &mut Dynamic,
    path: &AttributePath,
) {
    let Dynamic::Map(map) = planned else {
        return;
    };

    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let config_value = attr_value(config, &attr.name);
        let slot = map.entry(attr.name.clone()).or_insert(Dynamic::Null);

        if attr.computed && attr.default.is_none() && config_value.is_null() {
            *slot = Dynamic::Unknown;
            continue;
        }

        if let Some(nested) = &attr.nested_type {
            for child in nested_children(nested.nesting, config_value, &NULL, slot, &attr_path) {
                mark_computed_unknown(&nested.attributes, child.config, child.planned, &child.path);
            }
        }
    }
}

fn run_plan_modifiers(
    attributes: &[Attribute],
    config: &Dynamic,
    prior: &Dynamic,
    planned: &mut Dynamic,
    path: &AttributePath,
    created: bool,
    outcome: &mut PlanOutcome,
) {
    let Dynamic::Map(map) = planned else {
        return;
    };

    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let config_value = attr_value(config, &attr.name);
        let prior_value = attr_value(prior, &attr.name);
        let slot = map.entry(attr.name.clone()).or_insert(Dynamic::Null);

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: DynamicValue::new(config_value.clone()),
                state_value: DynamicValue::new(prior_value.clone()),
                plan_value: DynamicValue::new(slot.clone()),
                path: attr_path.clone(),
                resource_created: created,
            });
            *slot = response.plan_value.value;
            if response.requires_replace && !outcome.requires_replace.contains(&attr_path) {
                outcome.requires_replace.push(attr_path.clone());
            }
            outcome.diagnostics.extend(response.diagnostics);
        }

        if let Some(nested) = &attr.nested_type {
            for child in nested_children(nested.nesting, config_value, prior_value, slot, &attr_path)
            {
                run_plan_modifiers(
                    &nested.attributes,
                    child.config,
                    child.prior,
                    child.planned,
                    &child.path,
                    created,
                    outcome,
                );
            }
        }
    }
}

/// Runs attribute validators over every known, non-null configured value.
pub fn validate_attributes(
    attributes: &[Attribute],
    config: &Dynamic,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for attr in attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let value = attr_value(config, &attr.name);
        if value.is_null() || value.is_unknown() {
            continue;
        }

        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config_value: DynamicValue::new(value.clone()),
                path: attr_path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }

        if let Some(nested) = &attr.nested_type {
            for (child, child_path) in nested_config_children(nested.nesting, value, &attr_path) {
                validate_attributes(&nested.attributes, child, &child_path, diagnostics);
            }
        }
    }
}

fn unknowns_to_null(value: &Dynamic) -> Dynamic {
    match value {
        Dynamic::Unknown => Dynamic::Null,
        Dynamic::List(items) => Dynamic::List(items.iter().map(unknowns_to_null).collect()),
        Dynamic::Map(map) => Dynamic::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), unknowns_to_null(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn unsupported(feature: &str, detail: &str) -> Diagnostic {
    Diagnostic::error(format!("{} is not supported", feature), detail)
}

fn unsupported_ephemeral(type_name: &str) -> Diagnostic {
    unsupported(
        "Ephemeral resources",
        &format!("The provider does not implement the ephemeral resource type {}", type_name),
    )
}

fn decode_value(value: Option<&proto::DynamicValue>) -> Result<DynamicValue, TfplugError> {
    match value {
        Some(v) if !v.msgpack.is_empty() => DynamicValue::decode_msgpack(&v.msgpack),
        Some(v) if !v.json.is_empty() => DynamicValue::decode_json(&v.json),
        _ => Ok(DynamicValue::null()),
    }
}

fn decode_optional(
    value: Option<&proto::DynamicValue>,
) -> Result<Option<DynamicValue>, TfplugError> {
    match value {
        Some(_) => decode_value(value).map(|v| if v.is_null() { None } else { Some(v) }),
        None => Ok(None),
    }
}

fn encode_value(value: &DynamicValue) -> Result<proto::DynamicValue, TfplugError> {
    Ok(proto::DynamicValue {
        msgpack: value.encode_msgpack()?,
        json: vec![],
    })
}

pub fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn empty_schema() -> proto::Schema {
    proto::Schema {
        version: 0,
        block: Some(proto::schema::Block::default()),
    }
}

fn block_to_proto(block: &Block) -> proto::schema::Block {
    proto::schema::Block {
        version: block.version,
        attributes: block.attributes.iter().map(attribute_to_proto).collect(),
        block_types: vec![],
        description: block.description.clone(),
        description_kind: string_kind_to_proto(block.description_kind) as i32,
        deprecated: block.deprecated,
    }
}

fn attribute_to_proto(attr: &Attribute) -> proto::schema::Attribute {
    // Nested attributes describe their type through nested_type only.
    let (r#type, nested_type) = match &attr.nested_type {
        Some(nested) => (
            vec![],
            Some(proto::schema::Object {
                attributes: nested.attributes.iter().map(attribute_to_proto).collect(),
                nesting: nesting_to_proto(nested.nesting) as i32,
                min_items: 0,
                max_items: 0,
            }),
        ),
        None => (attr.r#type.to_bytes(), None),
    };

    proto::schema::Attribute {
        name: attr.name.clone(),
        r#type,
        nested_type,
        description: attr.description.clone(),
        required: attr.required,
        optional: attr.optional,
        computed: attr.computed,
        sensitive: attr.sensitive,
        description_kind: proto::StringKind::Plain as i32,
        deprecated: attr.deprecated,
        write_only: false,
    }
}

fn nesting_to_proto(nesting: ObjectNestingMode) -> proto::schema::object::NestingMode {
    use proto::schema::object::NestingMode;
    match nesting {
        ObjectNestingMode::Single => NestingMode::Single,
        ObjectNestingMode::List => NestingMode::List,
        ObjectNestingMode::Set => NestingMode::Set,
        ObjectNestingMode::Map => NestingMode::Map,
    }
}

fn string_kind_to_proto(kind: StringKind) -> proto::StringKind {
    match kind {
        StringKind::Plain => proto::StringKind::Plain,
        StringKind::Markdown => proto::StringKind::Markdown,
    }
}

fn server_capabilities_to_proto(caps: &ServerCapabilities) -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: caps.plan_destroy,
        get_provider_schema_optional: caps.get_provider_schema_optional,
        move_resource_state: caps.move_resource_state,
    }
}

fn client_capabilities_from_proto(caps: Option<proto::ClientCapabilities>) -> ClientCapabilities {
    caps.map(|c| ClientCapabilities {
        deferral_allowed: c.deferral_allowed,
        write_only_attributes_allowed: c.write_only_attributes_allowed,
    })
    .unwrap_or_default()
}

fn deferred_to_proto(deferred: &Deferred) -> proto::Deferred {
    use proto::deferred::Reason;
    let reason = match deferred.reason {
        DeferredReason::Unknown => Reason::Unknown,
        DeferredReason::ResourceConfigUnknown => Reason::ResourceConfigUnknown,
        DeferredReason::ProviderConfigUnknown => Reason::ProviderConfigUnknown,
        DeferredReason::AbsentPrereq => Reason::AbsentPrereq,
    };
    proto::Deferred {
        reason: reason as i32,
    }
}

pub fn diagnostics_to_proto(diagnostics: &[Diagnostic]) -> Vec<proto::Diagnostic> {
    diagnostics
        .iter()
        .map(|d| {
            let severity = match d.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            };
            proto::Diagnostic {
                severity: severity as i32,
                summary: d.summary.clone(),
                detail: d.detail.clone(),
                attribute: d.attribute.as_ref().map(path_to_proto),
            }
        })
        .collect()
}

fn path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::{step::Selector, Step};
    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticDefault;
    use crate::plan_modifier::{RequiresReplace, UseStateForUnknown};
    use crate::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
    use crate::validator::StringLengthValidator;

    fn test_schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(StringLengthValidator::at_most(8))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("model", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("purpose", AttributeType::String)
                    .optional()
                    .computed()
                    .default(StaticDefault::string("fine-tune"))
                    .build(),
            )
            .attribute(AttributeBuilder::new("created_at", AttributeType::Number).computed().build())
            .attribute(
                AttributeBuilder::nested(
                    "expires_after",
                    NestedType::single(vec![
                        AttributeBuilder::new("days", AttributeType::Number)
                            .required()
                            .build(),
                        AttributeBuilder::new("anchor", AttributeType::String)
                            .optional()
                            .computed()
                            .default(StaticDefault::string("last_active_at"))
                            .build(),
                    ]),
                )
                .optional()
                .build(),
            )
            .build()
    }

    fn object(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        DynamicValue::new(Dynamic::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ))
    }

    #[test]
    fn plan_create_marks_computed_unknown_and_applies_defaults() {
        let schema = test_schema();
        let config = object(&[("name", "job".into()), ("model", "gpt-4o".into())]);
        let outcome = plan_change(&schema, &DynamicValue::null(), &config, &config);

        let planned = &outcome.planned_state;
        assert!(planned.is_unknown_at(&AttributePath::new("id")));
        assert!(planned.is_unknown_at(&AttributePath::new("created_at")));
        assert_eq!(
            planned.get_string(&AttributePath::new("purpose")).unwrap(),
            "fine-tune"
        );
        assert!(planned.is_null_at(&AttributePath::new("expires_after")));
        assert!(outcome.requires_replace.is_empty());
    }

    #[test]
    fn plan_applies_nested_defaults() {
        let schema = test_schema();
        let expires = object(&[("days", Dynamic::Number(7.0))]).value;
        let config = object(&[
            ("name", "store".into()),
            ("model", "gpt-4o".into()),
            ("expires_after", expires),
        ]);
        let outcome = plan_change(&schema, &DynamicValue::null(), &config, &config);

        let anchor = AttributePath::new("expires_after").attribute("anchor");
        assert_eq!(
            outcome.planned_state.get_string(&anchor).unwrap(),
            "last_active_at"
        );
    }

    #[test]
    fn plan_without_changes_keeps_prior_state() {
        let schema = test_schema();
        let prior = object(&[
            ("id", "ft-1".into()),
            ("name", "job".into()),
            ("model", "gpt-4o".into()),
            ("purpose", "fine-tune".into()),
            ("created_at", Dynamic::Number(1.0)),
            ("expires_after", Dynamic::Null),
        ]);
        let config = object(&[("name", "job".into()), ("model", "gpt-4o".into())]);
        let outcome = plan_change(&schema, &prior, &prior, &config);

        assert!(values_equal(&outcome.planned_state.value, &prior.value));
        assert!(outcome.requires_replace.is_empty());
    }

    #[test]
    fn plan_update_keeps_id_and_requires_replace_on_model_change() {
        let schema = test_schema();
        let prior = object(&[
            ("id", "ft-1".into()),
            ("name", "job".into()),
            ("model", "gpt-4o".into()),
            ("purpose", "fine-tune".into()),
            ("created_at", Dynamic::Number(1.0)),
            ("expires_after", Dynamic::Null),
        ]);
        let config = object(&[("name", "job".into()), ("model", "gpt-4o-mini".into())]);
        let mut proposed = prior.clone();
        proposed
            .set_string(&AttributePath::new("model"), "gpt-4o-mini")
            .unwrap();

        let outcome = plan_change(&schema, &prior, &proposed, &config);
        let planned = &outcome.planned_state;
        assert_eq!(planned.get_string(&AttributePath::new("id")).unwrap(), "ft-1");
        assert!(planned.is_unknown_at(&AttributePath::new("created_at")));
        assert_eq!(outcome.requires_replace, vec![AttributePath::new("model")]);
    }

    #[test]
    fn validators_run_on_configured_values_only() {
        let schema = test_schema();
        let mut diagnostics = vec![];
        let config = object(&[("name", "far-too-long".into()), ("model", Dynamic::Unknown)]);
        validate_attributes(
            &schema.block.attributes,
            &config.value,
            &AttributePath::root(),
            &mut diagnostics,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some(AttributePath::new("name")));
    }

    #[test]
    fn nested_attributes_use_nested_type_on_the_wire() {
        let proto_schema = schema_to_proto(&test_schema());
        let block = proto_schema.block.unwrap();
        let expires = block
            .attributes
            .iter()
            .find(|a| a.name == "expires_after")
            .unwrap();
        assert!(expires.r#type.is_empty());
        let nested = expires.nested_type.as_ref().unwrap();
        assert_eq!(nested.nesting, proto::schema::object::NestingMode::Single as i32);
        assert_eq!(nested.attributes.len(), 2);

        let name = block.attributes.iter().find(|a| a.name == "name").unwrap();
        assert_eq!(name.r#type, b"\"string\"".to_vec());
        assert!(name.nested_type.is_none());
    }

    #[test]
    fn diagnostics_carry_attribute_paths() {
        let diags = diagnostics_to_proto(&[Diagnostic::error("bad", "value")
            .with_attribute(AttributePath::new("tools").index(0).attribute("type"))]);
        let path = diags[0].attribute.as_ref().unwrap();
        assert_eq!(path.steps.len(), 3);
        assert_eq!(diags[0].severity, proto::diagnostic::Severity::Error as i32);
    }

    #[test]
    fn unknowns_are_nulled_for_failed_applies() {
        let value = object(&[("id", Dynamic::Unknown), ("name", "x".into())]);
        let cleaned = unknowns_to_null(&value.value);
        assert!(cleaned.is_wholly_known());
        assert_eq!(attr_value(&cleaned, "id"), &Dynamic::Null);
    }
}
