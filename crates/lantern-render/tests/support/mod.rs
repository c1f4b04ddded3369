// SPDX-License-Identifier: CEPL-1.0
//! Scripted stand-ins for the window, device and swapchain. Every call lands
//! in a shared journal so tests can assert on ordering.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::anyhow;
use lantern_render::{
    Acquired, GpuDevice, PresentStatus, PresentationSurface, RenderResult, RenderSize,
    SurfaceWindow,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    WaitEvents,
    WaitIdle,
    CreateSurface { extent: RenderSize, recycled: bool },
    DropSurface { generation: u32 },
    AllocateCommandBuffers(usize),
    FreeCommandBuffers(usize),
    Begin(u64),
    End(u64),
    BeginPass { image: u32 },
    Viewport(RenderSize),
    EndPass,
    Acquire { slot: usize },
    Present { slot: usize, image: u32 },
    DropResource(&'static str),
}

pub type Journal = Rc<RefCell<Vec<Call>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn count(journal: &Journal, pred: impl Fn(&Call) -> bool) -> usize {
    journal.borrow().iter().filter(|c| pred(c)).count()
}

pub struct FakeWindow {
    journal: Journal,
    extent: RenderSize,
    /// Extents reported after each successive `wait_events`.
    pub pending: VecDeque<RenderSize>,
    pub resized: bool,
}

impl FakeWindow {
    pub fn new(journal: &Journal, extent: RenderSize) -> Self {
        Self {
            journal: journal.clone(),
            extent,
            pending: VecDeque::new(),
            resized: false,
        }
    }

    pub fn resize(&mut self, extent: RenderSize) {
        self.extent = extent;
        self.resized = true;
    }

    pub fn minimise_then(&mut self, later: impl IntoIterator<Item = RenderSize>) {
        self.extent = RenderSize::new(0, 0);
        self.pending.extend(later);
    }
}

impl SurfaceWindow for FakeWindow {
    fn extent(&self) -> RenderSize {
        self.extent
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_events(&mut self) {
        self.journal.borrow_mut().push(Call::WaitEvents);
        if let Some(next) = self.pending.pop_front() {
            self.extent = next;
        }
    }
}

/// Stands in for a mesh, pipeline or buffer: only records when it is destroyed.
pub struct FakeResource {
    journal: Journal,
    name: &'static str,
}

impl FakeResource {
    pub fn new(journal: &Journal, name: &'static str) -> Self {
        Self {
            journal: journal.clone(),
            name,
        }
    }
}

impl Drop for FakeResource {
    fn drop(&mut self) {
        self.journal.borrow_mut().push(Call::DropResource(self.name));
    }
}

#[derive(Default)]
pub struct Script {
    /// Format of each successive swapchain; the last one repeats.
    pub formats: VecDeque<u32>,
    pub acquires: VecDeque<Acquired>,
    /// `None` makes that present fail fatally.
    pub presents: VecDeque<Option<PresentStatus>>,
}

pub struct FakeDevice {
    pub journal: Journal,
    pub script: RefCell<Script>,
    pub image_count: usize,
    generation: RefCell<u32>,
}

impl FakeDevice {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            script: RefCell::new(Script::default()),
            image_count: 3,
            generation: RefCell::new(0),
        })
    }

    fn log(&self, call: Call) {
        self.journal.borrow_mut().push(call);
    }

    fn next_format(&self) -> u32 {
        let mut script = self.script.borrow_mut();
        if script.formats.len() > 1 {
            script.formats.pop_front().unwrap_or(0)
        } else {
            script.formats.front().copied().unwrap_or(0)
        }
    }
}

pub struct FakeSurface {
    device: Arc<FakeDevice>,
    pub generation: u32,
    format: u32,
    extent: RenderSize,
    next_image: u32,
}

impl Drop for FakeSurface {
    fn drop(&mut self) {
        self.device.log(Call::DropSurface {
            generation: self.generation,
        });
    }
}

impl PresentationSurface for FakeSurface {
    type CommandBuffer = u64;
    type Format = u32;

    fn image_format(&self) -> u32 {
        self.format
    }

    fn extent(&self) -> RenderSize {
        self.extent
    }

    fn image_count(&self) -> usize {
        self.device.image_count
    }

    fn acquire_next_image(&mut self, slot: usize) -> RenderResult<Acquired> {
        self.device.log(Call::Acquire { slot });
        if let Some(scripted) = self.device.script.borrow_mut().acquires.pop_front() {
            return Ok(scripted);
        }
        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.device.image_count as u32;
        Ok(Acquired::Image(image))
    }

    fn submit_and_present(&mut self, _cmd: u64, image_index: u32, slot: usize) -> RenderResult<PresentStatus> {
        self.device.log(Call::Present {
            slot,
            image: image_index,
        });
        match self.device.script.borrow_mut().presents.pop_front() {
            None => Ok(PresentStatus::Presented),
            Some(Some(status)) => Ok(status),
            Some(None) => Err(anyhow!("device lost").into()),
        }
    }
}

impl GpuDevice for FakeDevice {
    type CommandBuffer = u64;
    type Surface = FakeSurface;

    fn create_surface(
        device: &Arc<Self>,
        extent: RenderSize,
        previous: Option<&FakeSurface>,
    ) -> RenderResult<FakeSurface> {
        device.log(Call::CreateSurface {
            extent,
            recycled: previous.is_some(),
        });
        let generation = {
            let mut g = device.generation.borrow_mut();
            *g += 1;
            *g
        };
        Ok(FakeSurface {
            device: device.clone(),
            generation,
            format: device.next_format(),
            extent,
            next_image: 0,
        })
    }

    fn wait_idle(&self) -> RenderResult<()> {
        self.log(Call::WaitIdle);
        Ok(())
    }

    fn allocate_command_buffers(&self, count: usize) -> RenderResult<Vec<u64>> {
        self.log(Call::AllocateCommandBuffers(count));
        Ok((0..count as u64).map(|i| 100 + i).collect())
    }

    fn free_command_buffers(&self, buffers: &[u64]) {
        self.log(Call::FreeCommandBuffers(buffers.len()));
    }

    fn begin_command_buffer(&self, cmd: u64) -> RenderResult<()> {
        self.log(Call::Begin(cmd));
        Ok(())
    }

    fn end_command_buffer(&self, cmd: u64) -> RenderResult<()> {
        self.log(Call::End(cmd));
        Ok(())
    }

    fn begin_render_pass(&self, _cmd: u64, _surface: &FakeSurface, image_index: u32, _clear: [f32; 4]) {
        self.log(Call::BeginPass { image: image_index });
    }

    fn set_viewport_and_scissor(&self, _cmd: u64, extent: RenderSize) {
        self.log(Call::Viewport(extent));
    }

    fn end_render_pass(&self, _cmd: u64) {
        self.log(Call::EndPass);
    }
}
