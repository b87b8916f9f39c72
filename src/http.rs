use std::io::{self, Read};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Thin wrapper over ureq so the provider adapters only ever see the
/// `Response`/`Error` shapes below. The agent carries the User-Agent and
/// the per-call timeout; one client is built per run.
pub struct Client {
    agent: ureq::Agent,
    user_agent: Box<str>,
}

pub struct Request {
    inner: ureq::Request,
}

pub struct Response {
    reader: Box<dyn Read + Send + Sync + 'static>,
}

pub enum Error {
    Status(u16, Response),
    Transport(Box<str>),
}

impl Client {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            user_agent: user_agent.into(),
        }
    }

    pub fn get(&self, url: &str) -> Request {
        Request {
            inner: self.agent.get(url).set("User-Agent", &self.user_agent),
        }
    }

    pub fn put(&self, url: &str) -> Request {
        Request {
            inner: self.agent.put(url).set("User-Agent", &self.user_agent),
        }
    }
}

impl Request {
    pub fn query(mut self, param: &str, value: &str) -> Self {
        self.inner = self.inner.query(param, value);
        self
    }

    pub fn set(mut self, header: &str, value: &str) -> Self {
        self.inner = self.inner.set(header, value);
        self
    }

    pub fn call(self) -> Result<Response, Error> {
        convert(self.inner.call())
    }

    pub fn send_json(self, data: impl Serialize) -> Result<Response, Error> {
        convert(self.inner.send_json(data))
    }
}

fn convert(result: Result<ureq::Response, ureq::Error>) -> Result<Response, Error> {
    match result {
        Ok(resp) => Ok(Response {
            reader: resp.into_reader(),
        }),
        Err(ureq::Error::Status(code, resp)) => Err(Error::Status(
            code,
            Response {
                reader: resp.into_reader(),
            },
        )),
        Err(ureq::Error::Transport(tp)) => Err(Error::Transport(tp.to_string().into())),
    }
}

impl Response {
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, io::Error> {
        serde_json::from_reader(self.reader)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn into_string(self) -> Result<String, io::Error> {
        let mut vec = Vec::with_capacity(1024);
        let read = self.reader.take(2 * 1024 * 1024).read_to_end(&mut vec)?;
        vec.resize(read, 0);
        String::from_utf8(vec).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
