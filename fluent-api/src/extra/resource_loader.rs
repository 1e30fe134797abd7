//! Uploads buffer and image contents on a worker thread.
//!
//! Jobs are queued without blocking. The worker drains everything queued so far into one command
//! buffer, submits it on its own queue and waits for it, then picks up whatever arrived in the
//! meantime. Buffers and images end up in the SHADER_READ_ONLY state.

use crate::*;
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

/// Used to create a `FluentResourceLoader`
#[derive(Clone, Debug)]
pub struct FluentLoaderConfig {
    /// Queue the loader creates for itself. Transfer queues can't transition images into states
    /// used by shaders on every backend, so graphics is the safe choice.
    pub queue_type: FluentQueueType,
    pub thread_name: String,
    /// Payloads larger than this are rejected rather than staged
    pub max_staging_buffer_size: u64,
}

impl Default for FluentLoaderConfig {
    fn default() -> Self {
        FluentLoaderConfig {
            queue_type: FluentQueueType::Graphics,
            thread_name: "Resource Loader".to_string(),
            max_staging_buffer_size: DEFAULT_STAGING_BUFFER_SIZE,
        }
    }
}

/// Write `data` into `buffer` starting at `offset`
#[derive(Clone, Debug)]
pub struct FluentBufferUploadJob {
    pub buffer: FluentBuffer,
    pub offset: u64,
    pub data: Vec<u8>,
}

/// Replace mip level 0 of every layer of `image`. `data` holds the layers one after another, each
/// tightly packed.
#[derive(Clone, Debug)]
pub struct FluentImageUploadJob {
    pub image: FluentImage,
    pub data: Vec<u8>,
}

/// Fill the mip chain of an image from level 0. The image must already be in SHADER_READ_ONLY,
/// which is where image uploads leave it.
#[derive(Clone, Debug)]
pub struct FluentMipmapJob {
    pub image: FluentImage,
}

enum LoaderJob {
    UploadBuffer(FluentBufferUploadJob),
    UploadImage(FluentImageUploadJob),
    GenerateMipmaps(FluentMipmapJob),
}

enum LoaderMessage {
    Job(LoaderJob),
    Finish,
}

#[derive(Default)]
struct LoaderProgress {
    pending_jobs: usize,
    errors: Vec<FluentError>,
}

// Shared between the loader and its worker thread
#[derive(Default)]
struct LoaderSync {
    progress: Mutex<LoaderProgress>,
    idle: Condvar,
}

impl LoaderSync {
    fn lock(&self) -> MutexGuard<LoaderProgress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(
        &self,
        job_count: usize,
        result: FluentResult<()>,
    ) {
        let mut progress = self.lock();
        progress.pending_jobs -= job_count;
        if let Err(error) = result {
            progress.errors.push(error);
        }

        if progress.pending_jobs == 0 {
            self.idle.notify_all();
        }
    }
}

/// Owns a worker thread that uploads data to buffers and images.
///
/// Dropping the loader finishes every job queued so far, then joins the thread.
pub struct FluentResourceLoader {
    join_handle: Option<JoinHandle<()>>,
    job_tx: Sender<LoaderMessage>,
    sync: Arc<LoaderSync>,
    max_staging_buffer_size: u64,
}

impl FluentResourceLoader {
    pub fn new(
        device: &FluentDevice,
        config: &FluentLoaderConfig,
    ) -> FluentResult<Self> {
        let queue = device.create_queue(config.queue_type)?;
        let command_pool = queue.create_command_pool()?;
        let command_buffer = queue
            .create_command_buffers(&command_pool, 1)?
            .pop()
            .ok_or("no command buffer was allocated for the resource loader")?;

        let sync = Arc::new(LoaderSync::default());
        let worker = LoaderWorker {
            device: device.clone(),
            queue,
            command_pool,
            command_buffer,
            sync: sync.clone(),
        };

        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let join_handle = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker.run(job_rx))?;
        log::debug!("Started resource loader thread '{}'", config.thread_name);

        Ok(FluentResourceLoader {
            join_handle: Some(join_handle),
            job_tx,
            sync,
            max_staging_buffer_size: config.max_staging_buffer_size,
        })
    }

    pub fn upload_buffer(
        &self,
        job: FluentBufferUploadJob,
    ) -> FluentResult<()> {
        assert!(!job.data.is_empty(), "buffer upload has no data");
        assert!(
            job.offset + job.data.len() as u64 <= job.buffer.size(),
            "{} bytes at offset {} do not fit in a buffer of {} bytes",
            job.data.len(),
            job.offset,
            job.buffer.size()
        );
        self.verify_staging_size(&job.data)?;
        self.enqueue(LoaderJob::UploadBuffer(job))
    }

    pub fn upload_image(
        &self,
        job: FluentImageUploadJob,
    ) -> FluentResult<()> {
        let info = job.image.info();
        let expected_size = info.mip_level_size_in_bytes(0) * info.layer_count as u64;
        assert_eq!(
            expected_size,
            job.data.len() as u64,
            "image upload must hold mip level 0 of every layer"
        );
        assert!(
            !info.format.is_depth_or_stencil(),
            "depth/stencil images can't be uploaded"
        );
        self.verify_staging_size(&job.data)?;
        self.enqueue(LoaderJob::UploadImage(job))
    }

    pub fn generate_mipmaps(
        &self,
        job: FluentMipmapJob,
    ) -> FluentResult<()> {
        self.enqueue(LoaderJob::GenerateMipmaps(job))
    }

    /// Jobs queued or in flight
    pub fn pending_job_count(&self) -> usize {
        self.sync.lock().pending_jobs
    }

    /// Block until every queued job is done. Returns the first error since the last call, if any
    /// job failed.
    pub fn wait_idle(&self) -> FluentResult<()> {
        profiling::scope!("FluentResourceLoader::wait_idle");
        let mut progress = self.sync.lock();
        while progress.pending_jobs > 0 {
            progress = self
                .sync
                .idle
                .wait(progress)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let mut errors = progress.errors.drain(..);
        match errors.next() {
            Some(error) => {
                let further_errors = errors.count();
                if further_errors > 0 {
                    log::warn!(
                        "{} more resource loader errors were dropped",
                        further_errors
                    );
                }
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn verify_staging_size(
        &self,
        data: &[u8],
    ) -> FluentResult<()> {
        if data.len() as u64 > self.max_staging_buffer_size {
            Err(format!(
                "upload of {} bytes exceeds the staging limit of {} bytes",
                data.len(),
                self.max_staging_buffer_size
            ))?;
        }

        Ok(())
    }

    fn enqueue(
        &self,
        job: LoaderJob,
    ) -> FluentResult<()> {
        self.sync.lock().pending_jobs += 1;
        if self.job_tx.send(LoaderMessage::Job(job)).is_err() {
            self.sync.complete(1, Ok(()));
            Err("resource loader thread is not running")?;
        }

        Ok(())
    }
}

impl Drop for FluentResourceLoader {
    fn drop(&mut self) {
        // Fails only if the thread already exited
        let _ = self.job_tx.send(LoaderMessage::Finish);
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                log::error!("Resource loader thread panicked");
            }
        }
    }
}

struct LoaderWorker {
    device: FluentDevice,
    queue: FluentQueue,
    command_pool: FluentCommandPool,
    command_buffer: FluentCommandBuffer,
    sync: Arc<LoaderSync>,
}

impl LoaderWorker {
    fn run(
        self,
        job_rx: Receiver<LoaderMessage>,
    ) {
        profiling::register_thread!("Resource Loader");

        let mut finished = false;
        while !finished {
            let mut jobs = match job_rx.recv() {
                Ok(LoaderMessage::Job(job)) => vec![job],
                Ok(LoaderMessage::Finish) | Err(_) => break,
            };

            for message in job_rx.try_iter() {
                match message {
                    LoaderMessage::Job(job) => jobs.push(job),
                    LoaderMessage::Finish => {
                        finished = true;
                        break;
                    }
                }
            }

            let result = self.process_batch(&jobs);
            if let Err(e) = &result {
                log::error!("Resource loader batch of {} jobs failed: {}", jobs.len(), e);
            }

            self.sync.complete(jobs.len(), result);
        }

        log::debug!("Resource loader thread finishing");
        if let Err(e) = self.queue.destroy_command_pool(&self.command_pool) {
            log::warn!("Failed to destroy resource loader command pool: {}", e);
        }

        if let Err(e) = self.device.destroy_queue(&self.queue) {
            log::warn!("Failed to destroy resource loader queue: {}", e);
        }
    }

    fn process_batch(
        &self,
        jobs: &[LoaderJob],
    ) -> FluentResult<()> {
        profiling::scope!("LoaderWorker::process_batch");
        log::trace!("Resource loader processing {} jobs", jobs.len());

        let mut staging_buffers = Vec::default();
        let result = self.record_and_submit(jobs, &mut staging_buffers);

        // The submit waited for completion, so staging buffers are no longer in use
        for staging_buffer in staging_buffers {
            if let Err(e) = self.device.destroy_buffer(&staging_buffer) {
                log::warn!("Failed to destroy staging buffer: {}", e);
            }
        }

        result
    }

    fn record_and_submit(
        &self,
        jobs: &[LoaderJob],
        staging_buffers: &mut Vec<FluentBuffer>,
    ) -> FluentResult<()> {
        self.command_buffer.begin()?;
        let recorded = jobs.iter().try_for_each(|job| match job {
            LoaderJob::UploadBuffer(job) => self.record_buffer_upload(job, staging_buffers),
            LoaderJob::UploadImage(job) => self.record_image_upload(job, staging_buffers),
            LoaderJob::GenerateMipmaps(job) => self
                .command_buffer
                .cmd_generate_mipmaps(&job.image, FluentResourceState::SHADER_READ_ONLY),
        });

        // End even after a failure so the command buffer can be reused for the next batch
        let ended = self.command_buffer.end();
        recorded?;
        ended?;

        self.queue.immediate_submit(&self.command_buffer)
    }

    fn create_staging_buffer(
        &self,
        data: &[u8],
        staging_buffers: &mut Vec<FluentBuffer>,
    ) -> FluentResult<FluentBuffer> {
        let staging_buffer = self
            .device
            .create_buffer(&FluentBufferInfo::for_staging_buffer(data.len() as u64))?;
        staging_buffers.push(staging_buffer.clone());
        self.device
            .copy_to_host_visible_buffer(&staging_buffer, data)?;
        Ok(staging_buffer)
    }

    fn record_buffer_upload(
        &self,
        job: &FluentBufferUploadJob,
        staging_buffers: &mut Vec<FluentBuffer>,
    ) -> FluentResult<()> {
        if job.buffer.info().memory_usage.is_host_visible() {
            return self
                .device
                .copy_to_host_visible_buffer_with_offset(&job.buffer, &job.data, job.offset);
        }

        let staging_buffer = self.create_staging_buffer(&job.data, staging_buffers)?;
        self.command_buffer.cmd_barrier(
            &[FluentBufferBarrier::state_transition(
                &job.buffer,
                FluentResourceState::UNDEFINED,
                FluentResourceState::TRANSFER_DST,
            )],
            &[],
        )?;
        self.command_buffer.cmd_copy_buffer(
            &staging_buffer,
            0,
            &job.buffer,
            job.offset,
            job.data.len() as u64,
        )?;
        self.command_buffer.cmd_barrier(
            &[FluentBufferBarrier::state_transition(
                &job.buffer,
                FluentResourceState::TRANSFER_DST,
                FluentResourceState::SHADER_READ_ONLY,
            )],
            &[],
        )
    }

    fn record_image_upload(
        &self,
        job: &FluentImageUploadJob,
        staging_buffers: &mut Vec<FluentBuffer>,
    ) -> FluentResult<()> {
        let staging_buffer = self.create_staging_buffer(&job.data, staging_buffers)?;
        let info = job.image.info();
        let layer_size = info.mip_level_size_in_bytes(0);

        self.command_buffer.cmd_barrier(
            &[],
            &[FluentImageBarrier::state_transition(
                &job.image,
                FluentResourceState::UNDEFINED,
                FluentResourceState::TRANSFER_DST,
            )],
        )?;

        for array_layer in 0..info.layer_count {
            self.command_buffer.cmd_copy_buffer_to_image(
                &staging_buffer,
                &job.image,
                &FluentBufferImageCopy {
                    buffer_offset: array_layer as u64 * layer_size,
                    mip_level: 0,
                    array_layer,
                    width: 0,
                    height: 0,
                },
            )?;
        }

        self.command_buffer.cmd_barrier(
            &[],
            &[FluentImageBarrier::state_transition(
                &job.image,
                FluentResourceState::TRANSFER_DST,
                FluentResourceState::SHADER_READ_ONLY,
            )],
        )
    }
}

#[cfg(all(test, feature = "fluent-headless"))]
mod tests {
    use super::*;

    struct TestContext {
        _backend: FluentBackend,
        device: FluentDevice,
    }

    impl TestContext {
        fn new() -> Self {
            let _ = env_logger::try_init();
            let backend =
                create_renderer_backend(FluentApiType::Headless, &Default::default()).unwrap();
            let device = backend.create_device(&Default::default()).unwrap();
            TestContext {
                _backend: backend,
                device,
            }
        }

        fn buffer(
            &self,
            size: u64,
            memory_usage: FluentMemoryUsage,
        ) -> FluentBuffer {
            self.device
                .create_buffer(&FluentBufferInfo {
                    size,
                    descriptor_type: FluentDescriptorType::VERTEX_BUFFER,
                    memory_usage,
                })
                .unwrap()
        }
    }

    #[test]
    fn test_wait_idle_without_jobs() {
        let ctx = TestContext::new();
        let loader = FluentResourceLoader::new(&ctx.device, &Default::default()).unwrap();
        assert_eq!(0, loader.pending_job_count());
        loader.wait_idle().unwrap();
    }

    #[test]
    fn test_buffer_uploads() {
        let ctx = TestContext::new();
        let loader = FluentResourceLoader::new(&ctx.device, &Default::default()).unwrap();

        let mut uploads = Vec::default();
        for i in 0..16u8 {
            let memory_usage = if i % 2 == 0 {
                FluentMemoryUsage::GpuOnly
            } else {
                FluentMemoryUsage::CpuToGpu
            };
            let data: Vec<u8> = (0..64u8).map(|x| x.wrapping_mul(i + 1)).collect();
            let buffer = ctx.buffer(data.len() as u64, memory_usage);
            loader
                .upload_buffer(FluentBufferUploadJob {
                    buffer: buffer.clone(),
                    offset: 0,
                    data: data.clone(),
                })
                .unwrap();
            uploads.push((buffer, data));
        }

        loader.wait_idle().unwrap();
        assert_eq!(0, loader.pending_job_count());

        let headless = ctx.device.headless_device().unwrap();
        for (buffer, data) in &uploads {
            assert_eq!(data, &headless.read_buffer(buffer).unwrap());
        }
    }

    #[test]
    fn test_upload_with_offset() {
        let ctx = TestContext::new();
        let loader = FluentResourceLoader::new(&ctx.device, &Default::default()).unwrap();
        let buffer = ctx.buffer(8, FluentMemoryUsage::GpuOnly);
        loader
            .upload_buffer(FluentBufferUploadJob {
                buffer: buffer.clone(),
                offset: 4,
                data: vec![1, 2, 3, 4],
            })
            .unwrap();
        loader.wait_idle().unwrap();

        let headless = ctx.device.headless_device().unwrap();
        assert_eq!(
            vec![0u8, 0, 0, 0, 1, 2, 3, 4],
            headless.read_buffer(&buffer).unwrap()
        );
    }

    #[test]
    fn test_image_upload_and_mipmaps() {
        let ctx = TestContext::new();
        let loader = FluentResourceLoader::new(&ctx.device, &Default::default()).unwrap();
        let image = ctx
            .device
            .create_image(&FluentImageInfo {
                width: 2,
                height: 2,
                format: FluentFormat::R8_UNORM,
                layer_count: 2,
                mip_levels: 2,
                ..Default::default()
            })
            .unwrap();

        loader
            .upload_image(FluentImageUploadJob {
                image: image.clone(),
                data: vec![0, 4, 8, 12, 100, 100, 100, 100],
            })
            .unwrap();
        loader
            .generate_mipmaps(FluentMipmapJob {
                image: image.clone(),
            })
            .unwrap();
        loader.wait_idle().unwrap();

        let headless = ctx.device.headless_device().unwrap();
        assert_eq!(vec![0u8, 4, 8, 12], headless.read_image(&image, 0, 0).unwrap());
        assert_eq!(vec![100u8; 4], headless.read_image(&image, 1, 0).unwrap());
        assert_eq!(vec![6u8], headless.read_image(&image, 0, 1).unwrap());
        assert_eq!(vec![100u8], headless.read_image(&image, 1, 1).unwrap());
        assert_eq!(
            FluentImageLayout::ShaderReadOnlyOptimal,
            headless.image_layout(&image).unwrap()
        );
    }

    #[test]
    fn test_errors_reported_once() {
        let ctx = TestContext::new();
        let loader = FluentResourceLoader::new(&ctx.device, &Default::default()).unwrap();
        let buffer = ctx.buffer(4, FluentMemoryUsage::GpuOnly);
        ctx.device.destroy_buffer(&buffer).unwrap();

        loader
            .upload_buffer(FluentBufferUploadJob {
                buffer,
                offset: 0,
                data: vec![1, 2, 3, 4],
            })
            .unwrap();
        assert!(loader.wait_idle().is_err());
        loader.wait_idle().unwrap();

        // The loader keeps working after a failed batch
        let buffer = ctx.buffer(4, FluentMemoryUsage::GpuOnly);
        loader
            .upload_buffer(FluentBufferUploadJob {
                buffer: buffer.clone(),
                offset: 0,
                data: vec![5, 6, 7, 8],
            })
            .unwrap();
        loader.wait_idle().unwrap();
        let headless = ctx.device.headless_device().unwrap();
        assert_eq!(vec![5u8, 6, 7, 8], headless.read_buffer(&buffer).unwrap());
    }

    #[test]
    fn test_staging_limit() {
        let ctx = TestContext::new();
        let loader = FluentResourceLoader::new(
            &ctx.device,
            &FluentLoaderConfig {
                max_staging_buffer_size: 4,
                ..Default::default()
            },
        )
        .unwrap();
        let buffer = ctx.buffer(8, FluentMemoryUsage::GpuOnly);
        let result = loader.upload_buffer(FluentBufferUploadJob {
            buffer,
            offset: 0,
            data: vec![0; 8],
        });
        assert!(result.is_err());
        assert_eq!(0, loader.pending_job_count());
    }

    #[test]
    fn test_drop_finishes_queued_jobs() {
        let ctx = TestContext::new();
        let buffer = ctx.buffer(4, FluentMemoryUsage::GpuOnly);
        {
            let loader = FluentResourceLoader::new(&ctx.device, &Default::default()).unwrap();
            loader
                .upload_buffer(FluentBufferUploadJob {
                    buffer: buffer.clone(),
                    offset: 0,
                    data: vec![9, 9, 9, 9],
                })
                .unwrap();
        }

        let headless = ctx.device.headless_device().unwrap();
        assert_eq!(vec![9u8; 4], headless.read_buffer(&buffer).unwrap());
    }

    #[test]
    #[should_panic(expected = "do not fit")]
    fn test_oversized_upload_panics() {
        let ctx = TestContext::new();
        let loader = FluentResourceLoader::new(&ctx.device, &Default::default()).unwrap();
        let buffer = ctx.buffer(4, FluentMemoryUsage::GpuOnly);
        let _ = loader.upload_buffer(FluentBufferUploadJob {
            buffer,
            offset: 2,
            data: vec![0; 4],
        });
    }
}
