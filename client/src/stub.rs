//! Transport abstraction over the query service.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tonic::transport::Channel;

use quarry_proto::{
    ExecuteQueryResponse, QueryInfoParam, QueryInfoResponse, QueryParam, QueryResultParam,
    QueryResultPart, QueryServiceClient,
};

use crate::deadline::Deadline;
use crate::range_stream::MAX_FETCH_BYTES;

/// Server-streaming response, item by item.
pub type MessageStream<T> = BoxStream<'static, Result<T, tonic::Status>>;

/// The three server-streaming calls the driver consumes. Implemented over a
/// grpc channel in production and by scripted fakes in tests.
#[async_trait]
pub trait QueryServiceStub: Send + Sync {
    async fn execute_query(
        &self,
        param: QueryParam,
        deadline: Deadline,
    ) -> Result<MessageStream<ExecuteQueryResponse>, tonic::Status>;

    async fn get_query_info(
        &self,
        param: QueryInfoParam,
        deadline: Deadline,
    ) -> Result<MessageStream<QueryInfoResponse>, tonic::Status>;

    async fn get_query_result(
        &self,
        param: QueryResultParam,
        deadline: Deadline,
    ) -> Result<MessageStream<QueryResultPart>, tonic::Status>;
}

/// Headroom over the row-range byte limit for protobuf framing.
const MAX_RESPONSE_MESSAGE_BYTES: usize = MAX_FETCH_BYTES as usize + 4 * 1024 * 1024;

/// Production stub over a tonic channel. Holds a cheaply clonable client;
/// the channel itself is an external, possibly shared resource and is never
/// mutated here.
#[derive(Debug, Clone)]
pub struct GrpcQueryStub {
    client: QueryServiceClient<Channel>,
}

impl GrpcQueryStub {
    pub fn new(channel: Channel) -> Self {
        let client = QueryServiceClient::new(channel)
            .max_decoding_message_size(MAX_RESPONSE_MESSAGE_BYTES);
        Self { client }
    }
}

fn with_deadline<T>(param: T, deadline: Deadline) -> tonic::Request<T> {
    let mut request = tonic::Request::new(param);
    request.set_timeout(deadline.remaining());
    request
}

#[async_trait]
impl QueryServiceStub for GrpcQueryStub {
    async fn execute_query(
        &self,
        param: QueryParam,
        deadline: Deadline,
    ) -> Result<MessageStream<ExecuteQueryResponse>, tonic::Status> {
        let mut client = self.client.clone();
        let streaming = client
            .execute_query(with_deadline(param, deadline))
            .await?
            .into_inner();
        Ok(streaming.boxed())
    }

    async fn get_query_info(
        &self,
        param: QueryInfoParam,
        deadline: Deadline,
    ) -> Result<MessageStream<QueryInfoResponse>, tonic::Status> {
        let mut client = self.client.clone();
        let streaming = client
            .get_query_info(with_deadline(param, deadline))
            .await?
            .into_inner();
        Ok(streaming.boxed())
    }

    async fn get_query_result(
        &self,
        param: QueryResultParam,
        deadline: Deadline,
    ) -> Result<MessageStream<QueryResultPart>, tonic::Status> {
        let mut client = self.client.clone();
        let streaming = client
            .get_query_result(with_deadline(param, deadline))
            .await?
            .into_inner();
        Ok(streaming.boxed())
    }
}
