use ndarray::Array1;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::algorithms::evaluator::{Evaluator, Request, Tag};
use crate::cost::CostFunction;
use crate::error::SimplexError;
use crate::structs::vertex::Vertex;

/// Rank of the coordinator, workers are ranked from 1
pub const COORDINATOR: usize = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Request to evaluate a point
    Evaluate(Array1<f64>),
    /// The evaluated point and its cost
    Scored(Vertex),
    /// The evaluation failed on the worker side
    Failed(String),
}

/// Point-to-point message between the coordinator and a worker
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub source: usize,
    pub tag: Tag,
    pub body: Body,
}

impl Message {
    pub fn new(source: usize, tag: Tag, body: Body) -> Self {
        Self { source, tag, body }
    }
}

/// Sender a receive call accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Any,
    Rank(usize),
}

impl Source {
    fn accepts(&self, rank: usize) -> bool {
        match self {
            Source::Any => true,
            Source::Rank(r) => *r == rank,
        }
    }
}

/// Tagged point-to-point messaging between the coordinator and its workers
///
/// `receive` blocks until a message from `source` carrying `tag` is available. Messages
/// that arrive while waiting for another tag are kept until they are asked for.
pub trait Transport {
    fn workers(&self) -> usize;
    fn send(&mut self, message: Message, destination: usize) -> Result<(), SimplexError>;
    fn receive(&mut self, source: Source, tag: Tag) -> Result<Message, SimplexError>;
}

/// Workers running on local threads, connected through tokio channels
///
/// Every worker owns an inbox and shares one outbox back to the coordinator. Dropping the
/// transport closes the inboxes and joins the threads.
///
/// The coordinator blocks on its own runtime while waiting for answers, so the transport
/// cannot be spawned from within an async tokio context.
pub struct ThreadTransport {
    inboxes: Vec<UnboundedSender<Message>>,
    outbox: UnboundedReceiver<Message>,
    pending: Vec<Message>,
    handles: Vec<JoinHandle<()>>,
    runtime: Runtime,
    timeout: Duration,
}

impl ThreadTransport {
    pub fn spawn<C>(cost: Arc<C>, workers: usize, timeout: Duration) -> Result<Self, SimplexError>
    where
        C: CostFunction + Send + 'static,
    {
        if workers == 0 {
            return Err(SimplexError::invalid("at least one worker is required"));
        }
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(SimplexError::invalid(
                "worker threads cannot be driven from within an async runtime",
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| SimplexError::invalid(format!("unable to start runtime: {}", e)))?;

        let (reply, outbox) = mpsc::unbounded_channel();
        let mut inboxes = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for rank in 1..=workers {
            let (tx, rx) = mpsc::unbounded_channel();
            let cost = Arc::clone(&cost);
            let reply = reply.clone();
            let handle = std::thread::Builder::new()
                .name(format!("simplex-worker-{}", rank))
                .spawn(move || work(rank, cost, rx, reply))
                .map_err(|e| SimplexError::invalid(format!("unable to spawn worker: {}", e)))?;
            inboxes.push(tx);
            handles.push(handle);
        }
        tracing::debug!("Spawned {} workers", workers);

        Ok(Self {
            inboxes,
            outbox,
            pending: Vec::new(),
            handles,
            runtime,
            timeout,
        })
    }

    fn take_pending(&mut self, source: Source, tag: Tag) -> Option<Message> {
        let position = self
            .pending
            .iter()
            .position(|m| m.tag == tag && source.accepts(m.source))?;
        Some(self.pending.remove(position))
    }

    fn finished_worker(&self) -> usize {
        self.handles
            .iter()
            .position(|h| h.is_finished())
            .map(|i| i + 1)
            .unwrap_or(COORDINATOR)
    }
}

impl Transport for ThreadTransport {
    fn workers(&self) -> usize {
        self.inboxes.len()
    }

    fn send(&mut self, message: Message, destination: usize) -> Result<(), SimplexError> {
        let inbox = destination
            .checked_sub(1)
            .and_then(|i| self.inboxes.get(i))
            .ok_or(SimplexError::WorkerDisconnected(destination))?;
        tracing::trace!("Sending {} to worker {}", message.tag, destination);
        inbox
            .send(message)
            .map_err(|_| SimplexError::WorkerDisconnected(destination))
    }

    fn receive(&mut self, source: Source, tag: Tag) -> Result<Message, SimplexError> {
        if let Some(message) = self.take_pending(source, tag) {
            return Ok(message);
        }
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let outbox = &mut self.outbox;
            let received = self
                .runtime
                .block_on(async move { tokio::time::timeout_at(deadline, outbox.recv()).await });
            match received {
                Err(_) => {
                    return Err(SimplexError::WorkerTimeout {
                        tag,
                        timeout_ms: self.timeout.as_millis(),
                    })
                }
                Ok(None) => {
                    return Err(SimplexError::WorkerDisconnected(match source {
                        Source::Rank(rank) => rank,
                        Source::Any => self.finished_worker(),
                    }))
                }
                Ok(Some(message)) if message.tag == tag && source.accepts(message.source) => {
                    tracing::trace!("Received {} from worker {}", tag, message.source);
                    return Ok(message);
                }
                Ok(Some(message)) => self.pending.push(message),
            }
        }
    }
}

impl Drop for ThreadTransport {
    fn drop(&mut self) {
        self.inboxes.clear();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("A worker thread panicked");
            }
        }
    }
}

fn work<C: CostFunction>(
    rank: usize,
    cost: Arc<C>,
    mut inbox: UnboundedReceiver<Message>,
    reply: UnboundedSender<Message>,
) {
    while let Some(message) = inbox.blocking_recv() {
        let body = match message.body {
            Body::Evaluate(point) => match cost.evaluate(&point) {
                Ok(value) => Body::Scored(Vertex::scored(point, value)),
                Err(e) => Body::Failed(e.to_string()),
            },
            other => Body::Failed(format!("worker {} cannot handle {:?}", rank, other)),
        };
        if reply.send(Message::new(rank, message.tag, body)).is_err() {
            break;
        }
    }
}

/// Evaluator distributing every batch over the workers of a [Transport]
///
/// Requests are dealt round-robin, and the batch returns only once every response is in.
pub struct Coordinator<T: Transport> {
    transport: T,
}

impl<T: Transport> Coordinator<T> {
    pub fn new(transport: T) -> Result<Self, SimplexError> {
        if transport.workers() == 0 {
            return Err(SimplexError::invalid("at least one worker is required"));
        }
        Ok(Self { transport })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl Coordinator<ThreadTransport> {
    /// Coordinator over `workers` local threads sharing `cost`
    pub fn threaded<C>(cost: Arc<C>, workers: usize, timeout: Duration) -> Result<Self, SimplexError>
    where
        C: CostFunction + Send + 'static,
    {
        Self::new(ThreadTransport::spawn(cost, workers, timeout)?)
    }
}

impl<T: Transport> Evaluator for Coordinator<T> {
    fn evaluate(&mut self, batch: &[Request]) -> Result<Vec<f64>, SimplexError> {
        let workers = self.transport.workers();
        let destination = |k: usize| k % workers + 1;
        for (k, request) in batch.iter().enumerate() {
            let message = Message::new(
                COORDINATOR,
                request.tag,
                Body::Evaluate(request.point.clone()),
            );
            self.transport.send(message, destination(k))?;
        }

        let mut costs = Vec::with_capacity(batch.len());
        for (k, request) in batch.iter().enumerate() {
            let message = self
                .transport
                .receive(Source::Rank(destination(k)), request.tag)?;
            let cost = match message.body {
                Body::Scored(vertex) => {
                    vertex.cost().ok_or_else(|| SimplexError::UnexpectedMessage {
                        tag: request.tag,
                        detail: "vertex returned without a cost".to_string(),
                    })?
                }
                Body::Failed(reason) => {
                    return Err(SimplexError::Evaluation {
                        point: request.point.to_vec(),
                        reason,
                    })
                }
                Body::Evaluate(_) => {
                    return Err(SimplexError::UnexpectedMessage {
                        tag: request.tag,
                        detail: "evaluation request sent back to the coordinator".to_string(),
                    })
                }
            };
            costs.push(cost);
        }
        Ok(costs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::evaluator::{Role, SerialEvaluator};
    use crate::structs::parameters::Parameters;
    use ndarray::array;

    struct Sleepy {
        parameters: Parameters,
        delay: Duration,
    }

    impl CostFunction for Sleepy {
        fn parameters(&self) -> &Parameters {
            &self.parameters
        }

        fn evaluate(&self, point: &Array1<f64>) -> eyre::Result<f64> {
            std::thread::sleep(self.delay);
            if point[0] < 0.0 {
                eyre::bail!("negative input {}", point[0]);
            }
            Ok(point.iter().map(|x| x.sqrt()).sum())
        }
    }

    fn sleepy(delay_ms: u64) -> Arc<Sleepy> {
        Arc::new(Sleepy {
            parameters: Parameters::new()
                .add("a", 1.0, -10.0, 10.0)
                .add("b", 1.0, -10.0, 10.0),
            delay: Duration::from_millis(delay_ms),
        })
    }

    fn batch(points: &[[f64; 2]]) -> Vec<Request> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| Request::new(Tag::new(3, Role::Vertex(i)), array![p[0], p[1]]))
            .collect()
    }

    #[test]
    fn test_coordinator_matches_serial() {
        let cost = sleepy(0);
        let requests = batch(&[[1.0, 2.0], [3.0, 5.0], [0.5, 0.1], [7.0, 2.0], [9.0, 9.0]]);
        let serial = SerialEvaluator::new(cost.as_ref())
            .evaluate(&requests)
            .unwrap();
        let mut coordinator =
            Coordinator::threaded(Arc::clone(&cost), 3, Duration::from_secs(5)).unwrap();
        let parallel = coordinator.evaluate(&requests).unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&serial), bits(&parallel));
    }

    #[test]
    fn test_worker_failure_is_fatal() {
        let mut coordinator =
            Coordinator::threaded(sleepy(0), 2, Duration::from_secs(5)).unwrap();
        let requests = batch(&[[1.0, 1.0], [-1.0, 1.0]]);
        match coordinator.evaluate(&requests) {
            Err(SimplexError::Evaluation { point, reason }) => {
                assert_eq!(point, vec![-1.0, 1.0]);
                assert!(reason.contains("negative input"));
            }
            other => panic!("expected an evaluation error, got {:?}", other),
        }
    }

    #[test]
    fn test_worker_timeout() {
        let mut coordinator =
            Coordinator::threaded(sleepy(300), 1, Duration::from_millis(20)).unwrap();
        let requests = batch(&[[1.0, 1.0]]);
        assert!(matches!(
            coordinator.evaluate(&requests),
            Err(SimplexError::WorkerTimeout { timeout_ms: 20, .. })
        ));
    }

    #[test]
    fn test_out_of_order_responses_are_buffered() {
        let mut transport = ThreadTransport::spawn(sleepy(0), 2, Duration::from_secs(5)).unwrap();
        let first = Tag::new(1, Role::Centroid);
        let second = Tag::new(1, Role::Reflection);
        transport
            .send(Message::new(COORDINATOR, first, Body::Evaluate(array![4.0, 0.0])), 1)
            .unwrap();
        transport
            .send(Message::new(COORDINATOR, second, Body::Evaluate(array![9.0, 0.0])), 2)
            .unwrap();

        let answer = transport.receive(Source::Any, second).unwrap();
        assert_eq!(answer.source, 2);
        assert_eq!(answer.body, Body::Scored(Vertex::scored(array![9.0, 0.0], 3.0)));
        let answer = transport.receive(Source::Rank(1), first).unwrap();
        assert_eq!(answer.body, Body::Scored(Vertex::scored(array![4.0, 0.0], 2.0)));
    }

    #[test]
    fn test_unknown_worker() {
        let mut transport = ThreadTransport::spawn(sleepy(0), 1, Duration::from_secs(1)).unwrap();
        let tag = Tag::new(1, Role::Centroid);
        let result = transport.send(Message::new(COORDINATOR, tag, Body::Evaluate(array![1.0, 1.0])), 4);
        assert!(matches!(result, Err(SimplexError::WorkerDisconnected(4))));
        assert!(ThreadTransport::spawn(sleepy(0), 0, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_refused_inside_async_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let spawned = runtime.block_on(async {
            Coordinator::threaded(sleepy(0), 2, Duration::from_secs(1)).map(|_| ())
        });
        assert!(matches!(spawned, Err(SimplexError::InvalidConfiguration(_))));
    }
}
