//! Grpc client for `quarry.v1.QueryService`.
//!
//! Written in the expanded form tonic codegen emits, so it can be swapped for
//! generated output without touching callers.

pub mod query_service_client {
    #![allow(clippy::wildcard_imports)]

    use crate::messages::*;
    use tonic::codegen::http::uri::PathAndQuery;
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct QueryServiceClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl QueryServiceClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> QueryServiceClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::Body>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        /// Limits the maximum size of a decoded message.
        ///
        /// Default: `4MB`
        #[must_use]
        pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_decoding_message_size(limit);
            self
        }

        /// Limits the maximum size of an encoded message.
        ///
        /// Default: `usize::MAX`
        #[must_use]
        pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_encoding_message_size(limit);
            self
        }

        pub async fn execute_query(
            &mut self,
            request: impl tonic::IntoRequest<QueryParam>,
        ) -> Result<tonic::Response<tonic::codec::Streaming<ExecuteQueryResponse>>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic_prost::ProstCodec::default();
            let path = PathAndQuery::from_static("/quarry.v1.QueryService/ExecuteQuery");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("quarry.v1.QueryService", "ExecuteQuery"));
            self.inner.server_streaming(req, path, codec).await
        }

        pub async fn get_query_info(
            &mut self,
            request: impl tonic::IntoRequest<QueryInfoParam>,
        ) -> Result<tonic::Response<tonic::codec::Streaming<QueryInfoResponse>>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic_prost::ProstCodec::default();
            let path = PathAndQuery::from_static("/quarry.v1.QueryService/GetQueryInfo");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("quarry.v1.QueryService", "GetQueryInfo"));
            self.inner.server_streaming(req, path, codec).await
        }

        pub async fn get_query_result(
            &mut self,
            request: impl tonic::IntoRequest<QueryResultParam>,
        ) -> Result<tonic::Response<tonic::codec::Streaming<QueryResultPart>>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic_prost::ProstCodec::default();
            let path = PathAndQuery::from_static("/quarry.v1.QueryService/GetQueryResult");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("quarry.v1.QueryService", "GetQueryResult"));
            self.inner.server_streaming(req, path, codec).await
        }
    }
}
