use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use vs_ascii::{FrameComposer, GlyphCache};
use vs_core::charset::LuminanceQuantizer;
use vs_core::config::ConvertConfig;
use vs_core::error::ConvertError;
use vs_core::frame::{ComposedFrame, FrameBuffer, FrameProperties};
use vs_core::progress::{PipelineProgress, PipelineState};
use vs_core::traits::{FrameSink, FrameSource, GlyphRasterizer};

/// Fournit les collaborateurs d'un run : source, rasterizer, sink.
///
/// Chaque méthode est appelée au plus une fois, dans l'ordre
/// `preflight` → `open_source` → `rasterizer` → `open_sink`.
pub trait MediaIo {
    /// Checks that need no open file (paths, extensions). Runs after the
    /// configuration is validated and before the source is opened.
    ///
    /// # Errors
    /// `ConvertError::Config` for unusable paths.
    fn preflight(&self, _config: &ConvertConfig) -> Result<(), ConvertError> {
        Ok(())
    }

    /// # Errors
    /// `ConvertError::SourceRead` if the input cannot be opened.
    fn open_source(&mut self, config: &ConvertConfig) -> Result<Box<dyn FrameSource>, ConvertError>;

    /// # Errors
    /// `ConvertError::Config` if no usable font is available.
    fn rasterizer(&mut self, config: &ConvertConfig)
    -> Result<Box<dyn GlyphRasterizer>, ConvertError>;

    /// # Errors
    /// `ConvertError::SinkWrite` if the output cannot be created.
    fn open_sink(
        &mut self,
        properties: &FrameProperties,
        config: &ConvertConfig,
    ) -> Result<Box<dyn FrameSink>, ConvertError>;
}

/// Demande de conversion : configuration figée + accès aux médias.
pub struct RunRequest<M: MediaIo> {
    pub config: ConvertConfig,
    pub io: M,
}

/// Bilan d'un run réussi.
#[derive(Clone, Copy, Debug)]
pub struct RunReport {
    pub frames_written: u64,
    pub properties: FrameProperties,
    pub elapsed: Duration,
}

/// Machine à états d'une conversion.
///
/// `Idle → Loading → CacheBuilding → Converting → Writing → Done`, `Failed`
/// depuis tout état non terminal. L'état courant vit dans le
/// [`PipelineProgress`] partagé, lisible par un moniteur pendant le run.
pub struct Pipeline {
    progress: Arc<PipelineProgress>,
}

impl Pipeline {
    #[must_use]
    pub fn new(progress: Arc<PipelineProgress>) -> Self {
        Self { progress }
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.progress.state()
    }

    /// Exécute un run complet. Le sink est finalisé en cas de succès,
    /// abandonné sinon.
    ///
    /// # Errors
    /// Any [`ConvertError`]; the state is then `Failed`.
    pub fn run<M: MediaIo>(&self, request: RunRequest<M>) -> Result<RunReport, ConvertError> {
        if self.progress.state() != PipelineState::Idle {
            return Err(ConvertError::Config(
                "un pipeline ne peut exécuter qu'un seul run".into(),
            ));
        }
        let started = Instant::now();
        match self.execute(request, started) {
            Ok(report) => {
                self.progress.set_state(PipelineState::Done);
                log::info!(
                    "Conversion terminée : {} frames en {:.2?}",
                    report.frames_written,
                    report.elapsed
                );
                Ok(report)
            }
            Err(e) => {
                self.progress.set_state(PipelineState::Failed);
                log::error!("Conversion échouée ({:?}) : {e}", e.kind());
                Err(e)
            }
        }
    }

    fn execute<M: MediaIo>(
        &self,
        request: RunRequest<M>,
        started: Instant,
    ) -> Result<RunReport, ConvertError> {
        let RunRequest { config, mut io } = request;
        let progress = &*self.progress;

        progress.set_state(PipelineState::Loading);
        let glyphs = config.validate()?;
        io.preflight(&config)?;
        let mut source = io.open_source(&config)?;
        let info = source.info();
        let properties = FrameProperties::derive(&info, &config)?;
        progress.set_total(properties.frame_count);
        let (out_w, out_h) = properties.output_dimensions();
        log::info!(
            "Source {}x{} @ {:.3}fps → grille {}x{} × {}px = {out_w}x{out_h}",
            properties.source_width,
            properties.source_height,
            properties.fps,
            properties.coarse_columns,
            properties.coarse_rows,
            properties.cell_size
        );

        progress.set_state(PipelineState::CacheBuilding);
        let rasterizer = io.rasterizer(&config)?;
        let cache = Arc::new(GlyphCache::build(
            &glyphs,
            rasterizer.as_ref(),
            properties.cell_size,
        )?);
        drop(rasterizer);
        let mut composer = FrameComposer::new(
            properties,
            cache,
            LuminanceQuantizer::new(&glyphs),
            config.colour_mode,
        )?;

        let mut sink = io.open_sink(&properties, &config)?;
        progress.set_state(PipelineState::Converting);

        let budget = FrameBudget::new(properties.frame_count);
        let streamed = if config.pipelined {
            run_pipelined(
                source.as_mut(),
                &mut composer,
                sink.as_mut(),
                budget,
                progress,
                config.queue_capacity,
            )
        } else {
            run_sequential(source.as_mut(), &mut composer, sink.as_mut(), budget, progress)
        };
        drop(source);

        let frames_written = match streamed {
            Ok(n) => n,
            Err(e) => {
                sink.abort();
                return Err(e);
            }
        };
        if frames_written == 0 {
            sink.abort();
            return Err(ConvertError::SourceRead("la source ne contient aucune frame".into()));
        }

        progress.set_state(PipelineState::Writing);
        if let Err(e) = sink.finalize() {
            sink.abort();
            return Err(e);
        }

        Ok(RunReport {
            frames_written,
            properties,
            elapsed: started.elapsed(),
        })
    }
}

/// Nombre de frames à lire : exactement le total annoncé, ou jusqu'à l'EOF.
#[derive(Clone, Copy, Debug)]
struct FrameBudget {
    declared: Option<u64>,
}

impl FrameBudget {
    fn new(declared: Option<u64>) -> Self {
        Self { declared }
    }

    /// Frame `index` (0-based) of the stream, or `None` once the budget is spent.
    fn next(
        self,
        source: &mut dyn FrameSource,
        index: u64,
    ) -> Result<Option<FrameBuffer>, ConvertError> {
        if let Some(total) = self.declared
            && index >= total
        {
            match source.next_frame() {
                Ok(Some(_)) => log::warn!(
                    "La source contient plus de {total} frames annoncées : surplus ignoré"
                ),
                Ok(None) => {}
                Err(e) => log::debug!("Lecture après la dernière frame annoncée : {e}"),
            }
            return Ok(None);
        }
        match source.next_frame()? {
            Some(frame) => Ok(Some(frame)),
            None => match self.declared {
                Some(total) => Err(ConvertError::SourceRead(format!(
                    "{index} frames décodables sur {total} annoncées"
                ))),
                None => Ok(None),
            },
        }
    }
}

fn check_cancel(progress: &PipelineProgress) -> Result<(), ConvertError> {
    if progress.is_cancelled() {
        return Err(ConvertError::Cancelled);
    }
    Ok(())
}

fn write_one(
    sink: &mut dyn FrameSink,
    frame: &ComposedFrame,
    progress: &PipelineProgress,
) -> Result<(), ConvertError> {
    if progress.written() == 0 {
        progress.set_state(PipelineState::Writing);
    }
    sink.write(frame)?;
    progress.inc_written();
    Ok(())
}

/// Lecture → conversion → écriture, frame par frame, sur le thread appelant.
fn run_sequential(
    source: &mut dyn FrameSource,
    composer: &mut FrameComposer,
    sink: &mut dyn FrameSink,
    budget: FrameBudget,
    progress: &PipelineProgress,
) -> Result<u64, ConvertError> {
    let mut index = 0u64;
    loop {
        check_cancel(progress)?;
        let Some(raw) = budget.next(source, index)? else {
            break;
        };
        progress.inc_read();
        let composed = composer.compose(&raw)?;
        progress.inc_converted();
        write_one(sink, &composed, progress)?;
        index += 1;
    }
    Ok(index)
}

/// Trois étages reliés par deux files bornées (backpressure) :
/// lecteur et convertisseur sur leurs threads, écriture sur le thread appelant.
///
/// Une erreur dans un étage ferme sa file ; les autres étages s'arrêtent
/// à leur prochaine frontière de frame.
fn run_pipelined(
    source: &mut dyn FrameSource,
    composer: &mut FrameComposer,
    sink: &mut dyn FrameSink,
    budget: FrameBudget,
    progress: &PipelineProgress,
    capacity: usize,
) -> Result<u64, ConvertError> {
    let (raw_tx, raw_rx) = flume::bounded::<FrameBuffer>(capacity);
    let (out_tx, out_rx) = flume::bounded::<ComposedFrame>(capacity);

    thread::scope(|s| {
        let reader = thread::Builder::new()
            .name("vs-reader".into())
            .spawn_scoped(s, move || -> Result<(), ConvertError> {
                let mut index = 0u64;
                loop {
                    check_cancel(progress)?;
                    let Some(raw) = budget.next(source, index)? else {
                        return Ok(());
                    };
                    progress.inc_read();
                    if raw_tx.send(raw).is_err() {
                        return Ok(());
                    }
                    index += 1;
                }
            })
            .map_err(|e| ConvertError::SourceRead(format!("thread de lecture : {e}")))?;

        let converter = thread::Builder::new()
            .name("vs-converter".into())
            .spawn_scoped(s, move || -> Result<(), ConvertError> {
                for raw in &raw_rx {
                    check_cancel(progress)?;
                    let composed = composer.compose(&raw)?;
                    progress.inc_converted();
                    if out_tx.send(composed).is_err() {
                        return Ok(());
                    }
                }
                Ok(())
            })
            .map_err(|e| ConvertError::SourceRead(format!("thread de conversion : {e}")))?;

        let written = drain_into_sink(&out_rx, sink, progress);
        drop(out_rx);

        let read = reader
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        let converted = converter
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        read?;
        converted?;
        written
    })
}

/// Étage d'écriture : vide la file des frames composées dans le sink.
fn drain_into_sink(
    rx: &flume::Receiver<ComposedFrame>,
    sink: &mut dyn FrameSink,
    progress: &PipelineProgress,
) -> Result<u64, ConvertError> {
    let mut n = 0u64;
    for composed in rx {
        check_cancel(progress)?;
        write_one(sink, &composed, progress)?;
        n += 1;
    }
    Ok(n)
}
