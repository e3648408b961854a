//! Wire messages and gRPC plumbing for `mustang.v1.MustangService`.
//!
//! Hand-maintained in the shape `tonic-build` emits, so the crate builds
//! without `protoc`.

/// Fully-qualified gRPC service name.
pub const SERVICE_NAME: &str = "mustang.v1.MustangService";

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetMustangRequest {
    /// Canonical UUID string.
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateMustangRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateMustangRequest {
    /// Canonical UUID string.
    #[prost(string, tag = "1")]
    pub id: String,

    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteMustangRequest {
    /// Canonical UUID string.
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteMustangResponse {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MustangResponse {
    /// Canonical UUID string.
    #[prost(string, tag = "1")]
    pub id: String,

    #[prost(string, tag = "2")]
    pub name: String,
}

/// Generated-style gRPC client.
pub mod mustang_service_client {
    use super::*;
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct MustangServiceClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl MustangServiceClient<tonic::transport::Channel> {
        /// Connects to `dst` (e.g. `http://127.0.0.1:8080`).
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> MustangServiceClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn new(inner: T) -> Self {
            Self {
                inner: tonic::client::Grpc::new(inner),
            }
        }

        pub async fn get_mustang(
            &mut self,
            request: impl tonic::IntoRequest<GetMustangRequest>,
        ) -> std::result::Result<tonic::Response<MustangResponse>, tonic::Status> {
            self.unary(request, "GetMustang", "/mustang.v1.MustangService/GetMustang")
                .await
        }

        pub async fn create_mustang(
            &mut self,
            request: impl tonic::IntoRequest<CreateMustangRequest>,
        ) -> std::result::Result<tonic::Response<MustangResponse>, tonic::Status> {
            self.unary(
                request,
                "CreateMustang",
                "/mustang.v1.MustangService/CreateMustang",
            )
            .await
        }

        pub async fn update_mustang(
            &mut self,
            request: impl tonic::IntoRequest<UpdateMustangRequest>,
        ) -> std::result::Result<tonic::Response<MustangResponse>, tonic::Status> {
            self.unary(
                request,
                "UpdateMustang",
                "/mustang.v1.MustangService/UpdateMustang",
            )
            .await
        }

        pub async fn delete_mustang(
            &mut self,
            request: impl tonic::IntoRequest<DeleteMustangRequest>,
        ) -> std::result::Result<tonic::Response<DeleteMustangResponse>, tonic::Status> {
            self.unary(
                request,
                "DeleteMustang",
                "/mustang.v1.MustangService/DeleteMustang",
            )
            .await
        }

        async fn unary<Req, Res>(
            &mut self,
            request: impl tonic::IntoRequest<Req>,
            method: &'static str,
            path: &'static str,
        ) -> std::result::Result<tonic::Response<Res>, tonic::Status>
        where
            Req: prost::Message + std::marker::Send + std::marker::Sync + 'static,
            Res: prost::Message + Default + std::marker::Send + std::marker::Sync + 'static,
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(path);
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(tonic::GrpcMethod::new(SERVICE_NAME, method));
            self.inner.unary(req, path, codec).await
        }
    }
}

/// Generated-style gRPC server.
pub mod mustang_service_server {
    use super::*;
    use tonic::codegen::*;

    /// Server-side handlers for `mustang.v1.MustangService`.
    #[async_trait::async_trait]
    pub trait MustangService: std::marker::Send + std::marker::Sync + 'static {
        async fn get_mustang(
            &self,
            request: tonic::Request<GetMustangRequest>,
        ) -> std::result::Result<tonic::Response<MustangResponse>, tonic::Status>;

        async fn create_mustang(
            &self,
            request: tonic::Request<CreateMustangRequest>,
        ) -> std::result::Result<tonic::Response<MustangResponse>, tonic::Status>;

        async fn update_mustang(
            &self,
            request: tonic::Request<UpdateMustangRequest>,
        ) -> std::result::Result<tonic::Response<MustangResponse>, tonic::Status>;

        async fn delete_mustang(
            &self,
            request: tonic::Request<DeleteMustangRequest>,
        ) -> std::result::Result<tonic::Response<DeleteMustangResponse>, tonic::Status>;
    }

    pub struct MustangServiceServer<T: MustangService> {
        inner: Arc<T>,
    }

    impl<T: MustangService> MustangServiceServer<T> {
        pub fn new(inner: T) -> Self {
            Self::from_arc(Arc::new(inner))
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self { inner }
        }
    }

    impl<T: MustangService> Clone for MustangServiceServer<T> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl<T: MustangService> tonic::server::NamedService for MustangServiceServer<T> {
        const NAME: &'static str = SERVICE_NAME;
    }

    macro_rules! unary_svc {
        ($svc:ident, $method:ident, $req:ty, $res:ty) => {
            struct $svc<T: MustangService>(Arc<T>);

            impl<T: MustangService> tonic::server::UnaryService<$req> for $svc<T> {
                type Response = $res;
                type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

                fn call(&mut self, request: tonic::Request<$req>) -> Self::Future {
                    let inner = Arc::clone(&self.0);
                    Box::pin(async move { inner.$method(request).await })
                }
            }
        };
    }

    unary_svc!(GetMustangSvc, get_mustang, GetMustangRequest, MustangResponse);
    unary_svc!(CreateMustangSvc, create_mustang, CreateMustangRequest, MustangResponse);
    unary_svc!(UpdateMustangSvc, update_mustang, UpdateMustangRequest, MustangResponse);
    unary_svc!(DeleteMustangSvc, delete_mustang, DeleteMustangRequest, DeleteMustangResponse);

    impl<T, B> tonic::codegen::Service<http::Request<B>> for MustangServiceServer<T>
    where
        T: MustangService,
        B: Body + std::marker::Send + 'static,
        B::Error: Into<StdError> + std::marker::Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(
            &mut self,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = Arc::clone(&self.inner);

            match req.uri().path() {
                "/mustang.v1.MustangService/GetMustang" => Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.unary(GetMustangSvc(inner), req).await)
                }),
                "/mustang.v1.MustangService/CreateMustang" => Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.unary(CreateMustangSvc(inner), req).await)
                }),
                "/mustang.v1.MustangService/UpdateMustang" => Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.unary(UpdateMustangSvc(inner), req).await)
                }),
                "/mustang.v1.MustangService/DeleteMustang" => Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.unary(DeleteMustangSvc(inner), req).await)
                }),
                _ => Box::pin(async move {
                    let mut response = http::Response::new(tonic::body::empty_body());
                    let headers = response.headers_mut();
                    headers.insert(
                        "grpc-status",
                        http::HeaderValue::from(tonic::Code::Unimplemented as i32),
                    );
                    headers.insert(
                        http::header::CONTENT_TYPE,
                        http::HeaderValue::from_static("application/grpc"),
                    );
                    Ok(response)
                }),
            }
        }
    }
}
