use crossbeam_channel::{Receiver, Sender};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use super::analyser::AnalyserNode;
use super::filter::{BiquadFilter, FilterKind};
use super::gain::GainNode;
use super::graph::{AudioGraph, NodeId, NodeRole};
use super::media::MediaHandle;
use super::output::AudioOutput;
use crate::config::RENDER_QUANTUM;
use crate::error::{GraphError, TapError};

static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed,
    /// Waiting on a user gesture; the caller retries on the next interaction.
    Pending,
}

enum Processor {
    Source(MediaHandle),
    Filter(BiquadFilter),
    Analyser(AnalyserNode),
    Gain(GainNode),
    Destination,
}

/// Owns the audio graph, the per-node processing state and the output.
///
/// A new context starts suspended and only runs once a user gesture has
/// been recorded, matching how hosts gate audio playback. While not
/// running, `render` does nothing and media cursors do not advance.
pub struct AnalysisContext {
    id: u32,
    state: ContextState,
    user_activation: bool,
    graph: AudioGraph,
    processors: HashMap<NodeId, Processor>,
    destination: NodeId,
    output: Box<dyn AudioOutput>,
    subscribers: Vec<Sender<ContextState>>,
    scratch: Vec<f32>,
}

impl AnalysisContext {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        let mut graph = AudioGraph::new();
        let destination = graph.add_node(NodeRole::Destination);
        let mut processors = HashMap::new();
        processors.insert(destination, Processor::Destination);

        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!("Created audio context {}", id);

        Self {
            id,
            state: ContextState::Suspended,
            user_activation: false,
            graph,
            processors,
            destination,
            output,
            subscribers: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn queued_frames(&self) -> usize {
        self.output.queued_frames()
    }

    /// Receive every subsequent state change.
    pub fn subscribe(&mut self) -> Receiver<ContextState> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    fn set_state(&mut self, state: ContextState) {
        if self.state == state {
            return;
        }
        info!("Audio context {} {:?} -> {:?}", self.id, self.state, state);
        self.state = state;
        self.output.set_paused(state != ContextState::Running);
        self.subscribers.retain(|s| s.send(state).is_ok());
    }

    /// Record a user gesture; later `resume` calls may succeed.
    pub fn grant_user_activation(&mut self) {
        self.user_activation = true;
    }

    pub fn resume(&mut self) -> Result<ResumeOutcome, GraphError> {
        match self.state {
            ContextState::Closed => Err(GraphError::ContextClosed),
            ContextState::Running => Ok(ResumeOutcome::Resumed),
            ContextState::Suspended if self.user_activation => {
                self.set_state(ContextState::Running);
                Ok(ResumeOutcome::Resumed)
            }
            ContextState::Suspended => Ok(ResumeOutcome::Pending),
        }
    }

    pub fn suspend(&mut self) {
        if self.state == ContextState::Running {
            self.set_state(ContextState::Suspended);
        }
    }

    /// Release every node and the output. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == ContextState::Closed {
            return;
        }
        for processor in self.processors.values() {
            if let Processor::Source(media) = processor {
                media.borrow_mut().set_tapped_by(None);
            }
        }
        self.processors.clear();
        self.graph.clear();
        self.set_state(ContextState::Closed);
    }

    fn ensure_open(&self) -> Result<(), GraphError> {
        if self.state == ContextState::Closed {
            return Err(GraphError::ContextClosed);
        }
        Ok(())
    }

    fn add(&mut self, role: NodeRole, processor: Processor) -> NodeId {
        let id = self.graph.add_node(role);
        self.processors.insert(id, processor);
        id
    }

    pub fn create_analyser(
        &mut self,
        fft_size: usize,
        smoothing: f32,
        min_decibels: f32,
        max_decibels: f32,
    ) -> Result<NodeId, GraphError> {
        self.ensure_open()?;
        let node = AnalyserNode::new(fft_size, smoothing, min_decibels, max_decibels)?;
        Ok(self.add(NodeRole::Analyser, Processor::Analyser(node)))
    }

    pub fn create_gain(&mut self, value: f32) -> Result<NodeId, GraphError> {
        self.ensure_open()?;
        Ok(self.add(NodeRole::Gain, Processor::Gain(GainNode::new(value))))
    }

    pub fn create_filter(&mut self, kind: FilterKind, cutoff: f32, q: f32) -> Result<NodeId, GraphError> {
        self.ensure_open()?;
        let filter = BiquadFilter::new(kind, cutoff, q);
        Ok(self.add(NodeRole::Filter(kind), Processor::Filter(filter)))
    }

    /// Wrap a media element in a source node. An element can only feed one
    /// source node at a time, across all contexts.
    pub fn create_media_source(&mut self, media: &MediaHandle) -> Result<NodeId, TapError> {
        self.ensure_open()?;
        {
            let mut element = media.borrow_mut();
            if !element.is_valid() {
                return Err(TapError::ConnectionFailure("media handle is invalid".to_string()));
            }
            if let Some(owner) = element.tapped_by() {
                return Err(TapError::ConnectionFailure(format!(
                    "media element is already connected to audio context {}",
                    owner
                )));
            }
            element.set_tapped_by(Some(self.id));
        }
        Ok(self.add(NodeRole::Source, Processor::Source(media.clone())))
    }

    /// Remove a node and its edges; source nodes give their element back.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        if id == self.destination {
            return Err(GraphError::InvalidEdge {
                from: id,
                from_role: NodeRole::Destination,
                to: id,
                to_role: NodeRole::Destination,
            });
        }
        self.graph.remove_node(id)?;
        if let Some(Processor::Source(media)) = self.processors.remove(&id) {
            media.borrow_mut().set_tapped_by(None);
        }
        Ok(())
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        self.graph.connect(from, to)
    }

    pub fn disconnect(&mut self, id: NodeId) -> usize {
        self.graph.disconnect(id)
    }

    pub fn analyser(&self, id: NodeId) -> Option<&AnalyserNode> {
        match self.processors.get(&id) {
            Some(Processor::Analyser(node)) => Some(node),
            _ => None,
        }
    }

    pub fn analyser_mut(&mut self, id: NodeId) -> Option<&mut AnalyserNode> {
        match self.processors.get_mut(&id) {
            Some(Processor::Analyser(node)) => Some(node),
            _ => None,
        }
    }

    pub fn gain_mut(&mut self, id: NodeId) -> Option<&mut GainNode> {
        match self.processors.get_mut(&id) {
            Some(Processor::Gain(node)) => Some(node),
            _ => None,
        }
    }

    /// Pull `frames` frames from every source and push them through the graph.
    pub fn render(&mut self, frames: usize) {
        if self.state != ContextState::Running {
            return;
        }

        for source in self.graph.nodes_with_role(NodeRole::Source) {
            let Some(Processor::Source(media)) = self.processors.get(&source) else {
                continue;
            };
            let media = media.clone();
            let Some((channels, sample_rate)) = media.borrow().format() else {
                continue;
            };
            let channels = channels as usize;

            let mut remaining = frames;
            while remaining > 0 {
                let n = remaining.min(RENDER_QUANTUM);
                let mut block = std::mem::take(&mut self.scratch);
                block.clear();
                block.resize(n * channels, 0.0);

                let read = media.borrow_mut().read(&mut block);
                if read == 0 {
                    self.scratch = block;
                    break;
                }
                block.truncate(read - read % channels);
                self.route(source, &mut block, channels, sample_rate);
                remaining = remaining.saturating_sub(read / channels);
                self.scratch = block;
            }
        }
    }

    fn route(&mut self, from: NodeId, block: &mut Vec<f32>, channels: usize, sample_rate: u32) {
        let next: Vec<NodeId> = self.graph.successors(from).collect();
        match next.as_slice() {
            [] => {}
            [only] => {
                self.apply(*only, block, channels, sample_rate);
                self.route(*only, block, channels, sample_rate);
            }
            many => {
                for &node in many {
                    let mut branch = block.clone();
                    self.apply(node, &mut branch, channels, sample_rate);
                    self.route(node, &mut branch, channels, sample_rate);
                }
            }
        }
    }

    fn apply(&mut self, node: NodeId, block: &mut [f32], channels: usize, sample_rate: u32) {
        match self.processors.get_mut(&node) {
            Some(Processor::Filter(filter)) => filter.process(block, channels, sample_rate),
            Some(Processor::Analyser(analyser)) => analyser.push_interleaved(block, channels),
            Some(Processor::Gain(gain)) => gain.process(block, channels, sample_rate),
            Some(Processor::Destination) => self.output.write(block, channels as u16, sample_rate),
            Some(Processor::Source(_)) | None => {}
        }
    }
}

impl Drop for AnalysisContext {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::media::{DecodedMedia, MediaElement};
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingOutput(Rc<Cell<usize>>);

    impl AudioOutput for CountingOutput {
        fn write(&mut self, block: &[f32], channels: u16, _sample_rate: u32) {
            self.0.set(self.0.get() + block.len() / channels as usize);
        }

        fn queued_frames(&self) -> usize {
            0
        }
    }

    fn media(frames: usize) -> MediaHandle {
        let samples = (0..frames).map(|i| (i as f32 * 0.2).sin()).collect();
        MediaHandle::new(MediaElement::new(
            Box::new(DecodedMedia::from_samples(samples, 1, 44100)),
            "tone",
        ))
    }

    fn running_context() -> (AnalysisContext, Rc<Cell<usize>>) {
        let written = Rc::new(Cell::new(0));
        let mut ctx = AnalysisContext::new(Box::new(CountingOutput(written.clone())));
        ctx.grant_user_activation();
        assert_eq!(ctx.resume(), Ok(ResumeOutcome::Resumed));
        (ctx, written)
    }

    #[test]
    fn test_resume_pending_until_user_activation() {
        let mut ctx = AnalysisContext::new(Box::new(CountingOutput(Rc::new(Cell::new(0)))));
        let states = ctx.subscribe();
        assert_eq!(ctx.resume(), Ok(ResumeOutcome::Pending));
        assert_eq!(ctx.state(), ContextState::Suspended);

        ctx.grant_user_activation();
        assert_eq!(ctx.resume(), Ok(ResumeOutcome::Resumed));
        ctx.close();
        assert_eq!(ctx.resume(), Err(GraphError::ContextClosed));

        let seen: Vec<_> = states.try_iter().collect();
        assert_eq!(seen, vec![ContextState::Running, ContextState::Closed]);
    }

    #[test]
    fn test_render_routes_through_chain() {
        let (mut ctx, written) = running_context();
        let track = media(4096);
        track.play();
        let source = ctx.create_media_source(&track).unwrap();
        let analyser = ctx.create_analyser(256, 0.0, -100.0, -30.0).unwrap();
        let gain = ctx.create_gain(1.0).unwrap();
        let destination = ctx.destination();
        ctx.connect(source, analyser).unwrap();
        ctx.connect(analyser, gain).unwrap();
        ctx.connect(gain, destination).unwrap();

        ctx.render(1024);
        assert_eq!(written.get(), 1024);

        let mut out = vec![0u8; 128];
        ctx.analyser(analyser).unwrap().get_byte_time_domain_data(&mut out);
        assert!(out.iter().any(|&v| v != 128));
    }

    #[test]
    fn test_suspended_context_does_not_advance_media() {
        let mut ctx = AnalysisContext::new(Box::new(CountingOutput(Rc::new(Cell::new(0)))));
        let track = media(64);
        track.play();
        let source = ctx.create_media_source(&track).unwrap();
        let destination = ctx.destination();
        ctx.connect(source, destination).unwrap();
        ctx.render(64);
        assert!(!track.ended());
    }

    #[test]
    fn test_element_cannot_feed_two_contexts() {
        let (mut first, _) = running_context();
        let (mut second, _) = running_context();
        let track = media(64);

        let node = first.create_media_source(&track).unwrap();
        assert!(matches!(
            second.create_media_source(&track),
            Err(TapError::ConnectionFailure(_))
        ));

        first.remove_node(node).unwrap();
        assert!(second.create_media_source(&track).is_ok());
    }

    #[test]
    fn test_closed_context_rejects_nodes_and_releases_media() {
        let (mut ctx, _) = running_context();
        let track = media(64);
        ctx.create_media_source(&track).unwrap();
        ctx.close();
        ctx.close();
        assert_eq!(ctx.create_gain(1.0), Err(GraphError::ContextClosed));
        assert_eq!(track.borrow().tapped_by(), None);
    }
}
