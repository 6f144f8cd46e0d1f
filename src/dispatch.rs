//! 批量调度器
//!
//! 在有界的工作任务池上并行翻译，同时保证输出顺序与输入顺序一致。
//!
//! 生产者为每个单元启动一个任务，并把任务句柄按提交顺序放入有界队列；
//! 排空方严格按队列顺序等待每个句柄完成后再交给消费者。
//! 晚完成的单元只会推迟其后的输出，不会打乱顺序。

use crate::context::ContextVector;
use crate::error::{Result, TranslationError};
use crate::translator::Translator;
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// 排队中的任务句柄，被丢弃时取消对应任务
///
/// `run` 的 future 被提前丢弃（例如外层超时）时，队列和生产者手里的句柄
/// 随之释放，尚未完成的翻译任务不会在后台继续运行。
struct Job(JoinHandle<Result<String>>);

impl Job {
    async fn join(&mut self) -> Result<String> {
        match (&mut self.0).await {
            Ok(result) => result,
            Err(e) => Err(TranslationError::Worker(e.to_string())),
        }
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// 工作任务数上限，队列容量为其两倍，仍在信号量许可上限之内
const MAX_CONCURRENCY: usize = Semaphore::MAX_PERMITS / 2;

/// 单次运行的参数
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// 工作任务数，未设置时使用后端默认值
    pub concurrency: Option<usize>,
    /// 单条失败时输出空字符串并继续
    pub best_effort: bool,
    /// 本次运行的上下文覆盖
    pub context: Option<Arc<ContextVector>>,
}

impl RunOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn best_effort(mut self, best_effort: bool) -> Self {
        self.best_effort = best_effort;
        self
    }

    pub fn with_context(mut self, context: ContextVector) -> Self {
        self.context = Some(Arc::new(context));
        self
    }
}

/// 接收按顺序输出的翻译结果
#[async_trait]
pub trait UnitSink: Send {
    async fn accept(&mut self, unit: String) -> Result<()>;
}

#[async_trait]
impl UnitSink for Vec<String> {
    async fn accept(&mut self, unit: String) -> Result<()> {
        self.push(unit);
        Ok(())
    }
}

/// 把闭包包装成消费者
pub struct Callback<F>(pub F);

#[async_trait]
impl<F> UnitSink for Callback<F>
where
    F: FnMut(String) -> Result<()> + Send,
{
    async fn accept(&mut self, unit: String) -> Result<()> {
        (self.0)(unit)
    }
}

/// 每个单元写一行
pub struct LineSink<W> {
    writer: W,
}

impl<W> LineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> UnitSink for LineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn accept(&mut self, unit: String) -> Result<()> {
        self.writer.write_all(unit.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }
}

/// 顺序保持的批量调度器
///
/// ```rust
/// use ordered_translator::{Dispatcher, EchoTranslator, LanguagePair, RunOptions};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> ordered_translator::Result<()> {
/// let dispatcher = Dispatcher::new(Arc::new(EchoTranslator::new(LanguagePair::new("en", "it"))));
/// let mut output = Vec::new();
/// let count = dispatcher
///     .run_iter(vec!["one".to_string(), "two".to_string()], &mut output, RunOptions::default())
///     .await?;
/// assert_eq!(count, 2);
/// assert_eq!(output, vec!["one", "two"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    translator: Arc<dyn Translator>,
}

impl Dispatcher {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self { translator }
    }

    pub fn translator(&self) -> &Arc<dyn Translator> {
        &self.translator
    }

    /// 翻译 `producer` 产生的全部单元，按输入顺序交给 `consumer`
    ///
    /// 返回提交的单元数。非容错模式下第一个失败会中止整个批次：
    /// 不再提交新单元，排队中的任务被取消，错误返回给调用方；
    /// 已经交付的结果不会回滚。
    pub async fn run<S, C>(&self, producer: S, consumer: &mut C, options: RunOptions) -> Result<usize>
    where
        S: Stream<Item = Result<String>> + Send,
        C: UnitSink + ?Sized,
    {
        let concurrency = match options.concurrency {
            Some(n) => n,
            None => self.translator.default_concurrency().await?,
        }
        .clamp(1, MAX_CONCURRENCY);

        info!(
            translator = self.translator.name(),
            languages = %self.translator.languages(),
            concurrency,
            best_effort = options.best_effort,
            "starting batch"
        );

        let pool = Arc::new(Semaphore::new(concurrency));
        let (jobs, pending) = mpsc::channel::<Job>(concurrency * 2);

        let (produced, drained) = tokio::join!(
            self.produce(producer, jobs, pool, &options),
            drain(pending, consumer),
        );

        let delivered = drained?;
        let submitted = produced?;
        info!(submitted, delivered, "batch finished");
        Ok(submitted)
    }

    /// 内存序列的便捷入口
    pub async fn run_iter<I, C>(&self, units: I, consumer: &mut C, options: RunOptions) -> Result<usize>
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send,
        C: UnitSink + ?Sized,
    {
        self.run(stream::iter(units.into_iter().map(Ok)), consumer, options)
            .await
    }

    /// 逐行翻译文本流，每行输出后追加换行符
    pub async fn translate_stream<R, W>(&self, input: R, output: W, options: RunOptions) -> Result<usize>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let producer = stream::try_unfold(input.lines(), |mut lines| async move {
            let next = lines.next_line().await?;
            Ok::<_, TranslationError>(next.map(|line| (line, lines)))
        });

        let mut sink = LineSink::new(output);
        let outcome = self.run(producer, &mut sink, options).await;
        let flushed = sink.flush().await;

        let count = outcome?;
        flushed?;
        Ok(count)
    }

    /// 翻译 UTF-8 文件，一行一个单元
    ///
    /// 未指定上下文时由后端按输入文件推导一次，仅对本次调用生效。
    pub async fn translate_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        mut options: RunOptions,
    ) -> Result<usize> {
        let input = input.as_ref();

        if options.context.is_none() {
            options.context = self.translator.context_for_file(input).await?.map(Arc::new);
        }

        let reader = BufReader::new(File::open(input).await?);
        let writer = BufWriter::new(File::create(output.as_ref()).await?);

        self.translate_stream(reader, writer, options).await
    }

    async fn produce<S>(
        &self,
        producer: S,
        jobs: mpsc::Sender<Job>,
        pool: Arc<Semaphore>,
        options: &RunOptions,
    ) -> Result<usize>
    where
        S: Stream<Item = Result<String>> + Send,
    {
        futures::pin_mut!(producer);
        let mut count = 0;

        loop {
            let unit = tokio::select! {
                _ = jobs.closed() => break,
                next = producer.next() => match next {
                    Some(unit) => unit?,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = jobs.closed() => break,
                permit = pool.clone().acquire_owned() => {
                    permit.map_err(|e| TranslationError::Worker(e.to_string()))?
                }
            };

            let job = Job(tokio::spawn(translate_unit(
                self.translator.clone(),
                unit,
                options.context.clone(),
                options.best_effort,
                permit,
            )));

            // 发送失败时句柄随错误一起丢弃，任务被取消
            if jobs.send(job).await.is_err() {
                break;
            }
            count += 1;
        }

        debug!(count, "producer finished");
        Ok(count)
    }
}

async fn translate_unit(
    translator: Arc<dyn Translator>,
    unit: String,
    context: Option<Arc<ContextVector>>,
    best_effort: bool,
    _permit: OwnedSemaphorePermit,
) -> Result<String> {
    let translation = translator.translate(&unit, context.as_deref());
    if !best_effort {
        return translation.await;
    }

    // 容错模式下后端 panic 与普通失败一样写空行
    match AssertUnwindSafe(translation).catch_unwind().await {
        Ok(Ok(translation)) => Ok(translation),
        Ok(Err(e)) => {
            error!(error = %e, "translation failed, writing empty unit");
            Ok(String::new())
        }
        Err(payload) => {
            error!(panic = panic_message(&*payload), "translator panicked, writing empty unit");
            Ok(String::new())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

async fn drain<C>(mut pending: mpsc::Receiver<Job>, consumer: &mut C) -> Result<usize>
where
    C: UnitSink + ?Sized,
{
    let mut delivered = 0;

    while let Some(mut job) = pending.recv().await {
        let accepted = match job.join().await {
            Ok(translation) => consumer.accept(translation).await,
            Err(e) => Err(e),
        };

        if let Err(e) = accepted {
            pending.close();
            let mut abandoned = 0;
            while let Some(job) = pending.recv().await {
                drop(job);
                abandoned += 1;
            }
            debug!(delivered, abandoned, "batch aborted");
            return Err(e);
        }
        delivered += 1;
    }

    Ok(delivered)
}
