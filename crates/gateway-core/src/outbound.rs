mod http_client {
    #[cfg(not(target_arch = "wasm32"))]
    pub mod imp {
        use http::{Request, Response};
        use once_cell::sync::Lazy;
        use reqwest::Client;
        use std::error::Error;

        /// A single, global client, built once
        pub static CLIENT: Lazy<Client> = Lazy::new(Client::new);

        pub async fn call_outbound(
            req: Request<Vec<u8>>,
        ) -> Result<Response<Vec<u8>>, Box<dyn Error>> {
            let client = &*CLIENT;

            // Native path: turn http::Request into reqwest and back
            let method = req
                .method()
                .as_str()
                .parse::<reqwest::Method>()
                .map_err(|e| Box::<dyn Error>::try_from(e).unwrap())?;

            let mut rb = client.request(method, req.uri().to_string());

            // propagate headers
            for (name, value) in req.headers().iter() {
                let val_str = value.to_str()?;
                rb = rb.header(name.as_str(), val_str);
            }

            let resp = rb.body(req.into_body()).send().await?.error_for_status()?;

            let status = resp.status();
            let headers = resp.headers().clone();
            let bytes = resp.bytes().await?.to_vec();

            let mut builder = Response::builder().status(status.as_u16());
            for (name, value) in headers.iter() {
                // value.as_bytes() is &[u8]; builder.header accepts either &str or &[u8]
                builder = builder.header(name.as_str(), value.as_bytes());
            }
            Ok(builder.body(bytes).unwrap())
        }

        /// Like [`call_outbound`] but hands back the response body as a
        /// byte stream instead of buffering it, for the stream coordinator
        /// (C8) to decode frame-by-frame. A non-2xx status is read fully
        /// and turned into a `GatewayError` up front, same as the buffered
        /// path, so stream consumers never see a body read as if it were
        /// a successful SSE transcript.
        pub async fn call_outbound_streaming(
            req: Request<Vec<u8>>,
        ) -> Result<futures::stream::BoxStream<'static, Result<bytes::Bytes, crate::error::GatewayError>>, crate::error::GatewayError>
        {
            use futures::StreamExt;

            let client = &*CLIENT;
            let method = req
                .method()
                .as_str()
                .parse::<reqwest::Method>()
                .map_err(|e| crate::error::GatewayError::InvalidRequest(e.to_string()))?;

            let mut rb = client.request(method, req.uri().to_string());
            for (name, value) in req.headers().iter() {
                let val_str = value
                    .to_str()
                    .map_err(|e| crate::error::GatewayError::InvalidRequest(e.to_string()))?;
                rb = rb.header(name.as_str(), val_str);
            }

            let resp = rb.body(req.into_body()).send().await?;
            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                return Err(crate::error::GatewayError::ServerError { status, message: body });
            }

            let stream = resp
                .bytes_stream()
                .map(|chunk| chunk.map_err(crate::error::GatewayError::from));
            Ok(stream.boxed())
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub mod imp {
        use http::{Request, Response};
        use std::error::Error;

        use crate::error::GatewayError;

        /// No wasm HTTP host is wired up; the `http-client` feature is
        /// non-wasm only today (see the root `Cargo.toml`). Kept so the
        /// module compiles under `wasm32` targets without the feature.
        pub async fn call_outbound(
            _req: Request<Vec<u8>>,
        ) -> Result<Response<Vec<u8>>, Box<dyn Error>> {
            Err(Box::new(GatewayError::NotSupported("no outbound HTTP host on wasm32".into())))
        }

        pub async fn call_outbound_streaming(
            _req: Request<Vec<u8>>,
        ) -> Result<futures::stream::BoxStream<'static, Result<bytes::Bytes, GatewayError>>, GatewayError> {
            Err(GatewayError::NotSupported("no outbound HTTP host on wasm32".into()))
        }
    }
}

pub use http_client::imp::{call_outbound, call_outbound_streaming};
