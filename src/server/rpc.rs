//! gRPC front end for the record store.

use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::db::{Context, Mustang, Store, StoreError, parse_id};
use crate::pb::mustang_service_server::{MustangService, MustangServiceServer};
use crate::pb::{
    CreateMustangRequest, DeleteMustangRequest, DeleteMustangResponse, GetMustangRequest,
    MustangResponse, UpdateMustangRequest,
};
use crate::server::error::ServeError;
use crate::server::mux::MuxListener;

/// Serves `mustang.v1.MustangService` on connections routed from the mux.
pub async fn serve(listener: MuxListener, store: Store) -> Result<(), ServeError> {
    tonic::transport::Server::builder()
        .add_service(MustangServiceServer::new(MustangRpc::new(store)))
        .serve_with_incoming(listener)
        .await?;
    Ok(())
}

/// Adapts wire requests to store calls.
#[derive(Clone)]
pub struct MustangRpc {
    store: Store,
}

impl MustangRpc {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Runs a store call on the blocking pool.
    ///
    /// The call's context is cancelled if the request future is dropped
    /// before the call starts.
    async fn run<T, F>(&self, f: F) -> Result<T, Status>
    where
        T: Send + 'static,
        F: FnOnce(&Store, &Context<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        let token = CancellationToken::new();
        let _guard = token.clone().drop_guard();
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || {
            let ctx = Context::with_cancellation(token);
            f(&store, &ctx)
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "store task failed");
            Status::internal("store task failed")
        })?
        .map_err(status_from)
    }
}

fn validate_name(name: &str) -> Result<(), Status> {
    if name.trim().is_empty() {
        return Err(Status::invalid_argument("mustang name must not be empty"));
    }
    Ok(())
}

fn invalid_id(e: StoreError) -> Status {
    Status::invalid_argument(e.to_string())
}

/// Maps a store error to the status returned to the client.
pub fn status_from(e: StoreError) -> Status {
    let message = e.to_string();
    let status = match &e {
        StoreError::NotFound { .. } | StoreError::NoRowsAffected { .. } => {
            Status::not_found(message)
        }
        StoreError::NotCreated { .. } => Status::already_exists(message),
        e if e.is_constraint_violation() => Status::already_exists(message),
        StoreError::InvalidId { .. } => Status::invalid_argument(message),
        StoreError::Cancelled { .. } => Status::cancelled(message),
        e if e.is_busy() => Status::unavailable(message),
        _ => Status::internal(message),
    };

    if status.code() == tonic::Code::Internal {
        tracing::error!(error = %e, "request failed");
    } else {
        tracing::debug!(error = %e, code = ?status.code(), "request rejected");
    }
    status
}

#[async_trait::async_trait]
impl MustangService for MustangRpc {
    async fn get_mustang(
        &self,
        request: Request<GetMustangRequest>,
    ) -> Result<Response<MustangResponse>, Status> {
        let id = parse_id(&request.get_ref().id).map_err(invalid_id)?;
        let mustang = self
            .run(move |store, ctx| store.mustangs().get(ctx, id))
            .await?;
        Ok(Response::new(mustang.to_response()))
    }

    async fn create_mustang(
        &self,
        request: Request<CreateMustangRequest>,
    ) -> Result<Response<MustangResponse>, Status> {
        let request = request.into_inner();
        validate_name(&request.name)?;

        let mustang = Mustang::new(Uuid::new_v4(), request.name);
        let created = mustang.clone();
        self.run(move |store, ctx| store.mustangs().create(ctx, &created))
            .await?;
        tracing::info!(%mustang, "mustang created");
        Ok(Response::new(mustang.to_response()))
    }

    async fn update_mustang(
        &self,
        request: Request<UpdateMustangRequest>,
    ) -> Result<Response<MustangResponse>, Status> {
        let request = request.into_inner();
        let mustang = Mustang::from_request(&request.id, &request).map_err(invalid_id)?;
        validate_name(&mustang.name)?;

        let updated = mustang.clone();
        self.run(move |store, ctx| store.mustangs().update(ctx, &updated))
            .await?;
        Ok(Response::new(mustang.to_response()))
    }

    async fn delete_mustang(
        &self,
        request: Request<DeleteMustangRequest>,
    ) -> Result<Response<DeleteMustangResponse>, Status> {
        let id = parse_id(&request.get_ref().id).map_err(invalid_id)?;
        self.run(move |store, ctx| store.mustangs().delete(ctx, id))
            .await?;
        tracing::info!(%id, "mustang deleted");
        Ok(Response::new(DeleteMustangResponse {}))
    }
}
