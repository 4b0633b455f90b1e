// Flow Actor - 拍照 → 预览上传 → 菜谱 流程的唯一状态持有者
//
// 所有屏幕状态只在 Actor 内修改；拍照和上传在后台任务中执行，
// 完成后把结果作为消息发回 Actor，再由 Actor 更新状态

use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::{CaptureSession, CapturedPhoto};
use crate::error::FlowError;
use crate::event_bus::{AppEvent, EventBus};
use crate::navigation::{Animation, NavOptions, NavigationController, Screen, Transition};
use crate::permission::PermissionGate;
use crate::recipe::RecipeView;
use crate::settings::SettingsManager;
use crate::upload::{PreviewSession, PreviewSnapshot, RecipeUploader, UploadForm};

/// 错误回调：每个错误都会通知一次
pub type ErrorCallback = Arc<dyn Fn(&FlowError) + Send + Sync>;

/// 当前界面状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSnapshot {
    pub screen: Screen,
    pub route: String,
    pub animation: Animation,
    pub can_go_back: bool,
    pub camera_ready: bool,
    pub capturing: bool,
    pub preview: Option<PreviewSnapshot>,
    pub recipe: Option<RecipeView>,
}

/// 启动后台操作的结果
#[derive(Debug)]
pub enum Dispatch {
    /// 后台操作已开始，完成后收到最终状态
    Started(oneshot::Receiver<FlowSnapshot>),
    /// 没有启动后台操作（被忽略或立即失败），附带当前状态
    Done(FlowSnapshot),
}

impl Dispatch {
    /// 等待后台操作完成
    pub async fn settle(self) -> Option<FlowSnapshot> {
        match self {
            Self::Started(rx) => rx.await.ok(),
            Self::Done(snapshot) => Some(snapshot),
        }
    }
}

/// 流程命令
pub enum FlowCommand {
    /// 跳转到指定屏幕
    Navigate {
        screen: Screen,
        reply: oneshot::Sender<FlowSnapshot>,
    },

    /// 返回
    Back {
        reply: oneshot::Sender<FlowSnapshot>,
    },

    /// 按下快门
    Shutter {
        reply: oneshot::Sender<Result<Dispatch, FlowError>>,
    },

    /// 拍照完成（后台任务发回）
    CaptureFinished {
        result: Result<CapturedPhoto, FlowError>,
        done: oneshot::Sender<FlowSnapshot>,
    },

    /// 获取预览帧
    PreviewFrame {
        reply: oneshot::Sender<Result<Vec<u8>, FlowError>>,
    },

    /// 编辑备注
    SetCaption {
        caption: String,
        reply: oneshot::Sender<Result<FlowSnapshot, FlowError>>,
    },

    /// 提交上传
    Submit {
        reply: oneshot::Sender<Result<Dispatch, FlowError>>,
    },

    /// 上传完成（后台任务发回）
    UploadFinished {
        session_id: Uuid,
        result: Result<String, FlowError>,
        done: oneshot::Sender<FlowSnapshot>,
    },

    /// 获取当前状态
    Get {
        reply: oneshot::Sender<FlowSnapshot>,
    },
}

/// 流程 Actor
pub struct FlowActor {
    receiver: mpsc::Receiver<FlowCommand>,
    sender: mpsc::WeakSender<FlowCommand>,
    nav: NavigationController,
    last_animation: Animation,
    gate: PermissionGate,
    capture: CaptureSession,
    preview: Option<PreviewSession>,
    uploader: Arc<dyn RecipeUploader>,
    settings: Arc<SettingsManager>,
    event_bus: Arc<EventBus>,
    on_error: ErrorCallback,
}

impl FlowActor {
    /// 创建新的Actor
    pub fn new(
        gate: PermissionGate,
        capture: CaptureSession,
        uploader: Arc<dyn RecipeUploader>,
        settings: Arc<SettingsManager>,
        event_bus: Arc<EventBus>,
        on_error: ErrorCallback,
    ) -> (Self, FlowHandle) {
        let (sender, receiver) = mpsc::channel(32);
        let actor = Self {
            receiver,
            sender: sender.downgrade(),
            nav: NavigationController::new(),
            last_animation: Animation::Default,
            gate,
            capture,
            preview: None,
            uploader,
            settings,
            event_bus,
            on_error,
        };
        (actor, FlowHandle { sender })
    }

    /// 运行Actor
    pub async fn run(mut self) {
        info!("Flow Actor 已启动");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                FlowCommand::Navigate { screen, reply } => {
                    self.navigate(screen, NavOptions::default()).await;
                    let _ = reply.send(self.publish());
                }

                FlowCommand::Back { reply } => {
                    self.back().await;
                    let _ = reply.send(self.publish());
                }

                FlowCommand::Shutter { reply } => {
                    let _ = reply.send(self.shutter());
                }

                FlowCommand::CaptureFinished { result, done } => {
                    self.capture_finished(result).await;
                    let _ = done.send(self.publish());
                }

                FlowCommand::PreviewFrame { reply } => {
                    let _ = reply.send(self.capture.preview_frame().await);
                }

                FlowCommand::SetCaption { caption, reply } => {
                    let result = self.set_caption(caption).map(|_| self.snapshot());
                    let _ = reply.send(result);
                }

                FlowCommand::Submit { reply } => {
                    let _ = reply.send(self.submit().await);
                }

                FlowCommand::UploadFinished {
                    session_id,
                    result,
                    done,
                } => {
                    self.upload_finished(session_id, result).await;
                    let _ = done.send(self.publish());
                }

                FlowCommand::Get { reply } => {
                    let _ = reply.send(self.snapshot());
                }
            }
        }

        // 进程退出前释放相机
        self.capture.unbind().await;
        info!("Flow Actor 已停止");
    }

    fn snapshot(&self) -> FlowSnapshot {
        let screen = self.nav.current().clone();
        let recipe = match &screen {
            Screen::Recipe { recipe, photo_uri } => {
                Some(RecipeView::new(recipe.as_deref(), photo_uri.as_deref()))
            }
            _ => None,
        };

        FlowSnapshot {
            route: screen.route(),
            screen,
            animation: self.last_animation,
            can_go_back: self.nav.stack().len() > 1,
            camera_ready: self.capture.is_bound(),
            capturing: self.capture.shot_in_flight(),
            preview: self.preview.as_ref().map(PreviewSession::snapshot),
            recipe,
        }
    }

    /// 生成快照并广播
    fn publish(&self) -> FlowSnapshot {
        let snapshot = self.snapshot();
        self.event_bus
            .publish(AppEvent::FlowChanged(snapshot.clone()));
        snapshot
    }

    fn report(&self, error: &FlowError) {
        warn!("{}", error);
        (self.on_error)(error);
    }

    async fn navigate(&mut self, screen: Screen, options: NavOptions) {
        let transition = self.nav.navigate(screen, options);
        self.on_transition(transition).await;
    }

    async fn back(&mut self) {
        if let Some(transition) = self.nav.back() {
            self.on_transition(transition).await;
        }
    }

    /// 屏幕切换后同步各屏幕占用的资源
    async fn on_transition(&mut self, transition: Transition) {
        self.last_animation = transition.animation;
        let Transition { from, to, .. } = transition;

        if from == Screen::Camera && to != Screen::Camera {
            self.capture.unbind().await;
        }

        match &to {
            Screen::Preview { photo_uri } => {
                // 每次进入预览屏幕都是一个新的会话
                self.preview = Some(PreviewSession::new(photo_uri.clone()));
            }
            _ => {
                if let Some(session) = self.preview.take() {
                    if session.is_sending() {
                        debug!("离开预览屏幕，进行中的上传结果将被丢弃");
                    }
                }
            }
        }

        if to == Screen::Camera && from != Screen::Camera {
            self.enter_camera().await;
        }
    }

    /// 进入拍照屏幕：先过权限门，再绑定相机
    async fn enter_camera(&mut self) {
        let config = self.settings.get().await;

        if let Err(e) = self
            .gate
            .ensure(config.permission_policy, &config.capture)
            .await
        {
            self.report(&e);
            let transition = self.nav.pop_to_main();
            self.last_animation = transition.animation;
            return;
        }

        if let Err(e) = self.capture.bind(config.capture).await {
            self.report(&e);
        }
    }

    fn shutter(&mut self) -> Result<Dispatch, FlowError> {
        if self.nav.current() != &Screen::Camera {
            return Err(FlowError::InvalidState("съёмка доступна только на экране камеры"));
        }

        let shot = match self.capture.begin_shot(Local::now()) {
            Ok(Some(shot)) => shot,
            Ok(None) => {
                debug!("拍照进行中，忽略本次快门");
                return Ok(Dispatch::Done(self.snapshot()));
            }
            Err(e) => {
                self.report(&e);
                return Ok(Dispatch::Done(self.snapshot()));
            }
        };

        let Some(sender) = self.sender.upgrade() else {
            self.capture.finish_shot();
            return Ok(Dispatch::Done(self.snapshot()));
        };

        info!("快门: {:?}", shot.path);
        let (done, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = shot.run().await;
            let _ = sender
                .send(FlowCommand::CaptureFinished { result, done })
                .await;
        });

        self.publish();
        Ok(Dispatch::Started(rx))
    }

    async fn capture_finished(&mut self, result: Result<CapturedPhoto, FlowError>) {
        self.capture.finish_shot();

        if self.nav.current() != &Screen::Camera {
            debug!("已离开拍照屏幕，丢弃拍照结果: {:?}", result);
            return;
        }

        match result {
            Ok(photo) => {
                self.navigate(
                    Screen::Preview {
                        photo_uri: photo.uri(),
                    },
                    NavOptions::default(),
                )
                .await;
            }
            Err(e) => self.report(&e),
        }
    }

    fn set_caption(&mut self, caption: String) -> Result<(), FlowError> {
        let session = self
            .preview
            .as_mut()
            .ok_or(FlowError::InvalidState("нет экрана предпросмотра"))?;
        if !session.set_caption(caption) {
            debug!("发送中，忽略备注修改");
        }
        Ok(())
    }

    async fn submit(&mut self) -> Result<Dispatch, FlowError> {
        let session = self
            .preview
            .as_mut()
            .ok_or(FlowError::InvalidState("нет экрана предпросмотра"))?;

        if !session.begin_submit() {
            debug!("上传进行中，忽略重复提交");
            return Ok(Dispatch::Done(self.snapshot()));
        }

        let session_id = session.id();
        let caption = session.caption().to_string();
        let photo = CapturedPhoto::from_uri(session.photo_uri());

        // 在任何网络请求之前确认文件存在
        let form = match photo {
            Some(photo) => UploadForm::from_photo(&photo, &caption).await,
            None => Err(FlowError::FileNotFound(session.photo_uri().into())),
        };
        let form = match form {
            Ok(form) => form,
            Err(e) => {
                if let Some(session) = self.preview.as_mut() {
                    session.fail(&e);
                }
                self.report(&e);
                return Ok(Dispatch::Done(self.publish()));
            }
        };

        let Some(sender) = self.sender.upgrade() else {
            return Ok(Dispatch::Done(self.snapshot()));
        };

        let uploader = self.uploader.clone();
        let upload_settings = self.settings.get().await.upload;
        let (done, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = uploader.upload(&upload_settings, form).await;
            let _ = sender
                .send(FlowCommand::UploadFinished {
                    session_id,
                    result,
                    done,
                })
                .await;
        });

        self.publish();
        Ok(Dispatch::Started(rx))
    }

    async fn upload_finished(&mut self, session_id: Uuid, result: Result<String, FlowError>) {
        let Some(session) = self
            .preview
            .as_mut()
            .filter(|session| session.id() == session_id)
        else {
            debug!("预览屏幕已关闭，丢弃上传结果");
            return;
        };

        session.complete(&result);
        let photo_uri = session.photo_uri().to_string();

        match result {
            Ok(body) => {
                let recipe = if body.is_empty() { None } else { Some(body) };
                self.navigate(
                    Screen::Recipe {
                        recipe,
                        photo_uri: Some(photo_uri),
                    },
                    NavOptions {
                        pop_up_to_main: true,
                    },
                )
                .await;
            }
            Err(e) => self.report(&e),
        }
    }
}

/// 流程 Handle
#[derive(Clone)]
pub struct FlowHandle {
    sender: mpsc::Sender<FlowCommand>,
}

impl FlowHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> FlowCommand,
    ) -> Result<T, FlowError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| FlowError::InvalidState("поток приложения остановлен"))?;
        rx.await
            .map_err(|_| FlowError::InvalidState("поток приложения остановлен"))
    }

    /// 获取当前状态
    pub async fn get(&self) -> Result<FlowSnapshot, FlowError> {
        self.request(|reply| FlowCommand::Get { reply }).await
    }

    /// 跳转到屏幕
    pub async fn navigate(&self, screen: Screen) -> Result<FlowSnapshot, FlowError> {
        self.request(|reply| FlowCommand::Navigate { screen, reply })
            .await
    }

    /// 按路由字符串跳转
    pub async fn navigate_route(&self, route: &str) -> Result<FlowSnapshot, FlowError> {
        self.navigate(Screen::parse_route(route)?).await
    }

    /// 返回上一屏
    pub async fn back(&self) -> Result<FlowSnapshot, FlowError> {
        self.request(|reply| FlowCommand::Back { reply }).await
    }

    /// 按下快门
    pub async fn shutter(&self) -> Result<Dispatch, FlowError> {
        self.request(|reply| FlowCommand::Shutter { reply }).await?
    }

    /// 最近一帧预览
    pub async fn preview_frame(&self) -> Result<Vec<u8>, FlowError> {
        self.request(|reply| FlowCommand::PreviewFrame { reply })
            .await?
    }

    /// 编辑备注
    pub async fn set_caption(&self, caption: String) -> Result<FlowSnapshot, FlowError> {
        self.request(|reply| FlowCommand::SetCaption { caption, reply })
            .await?
    }

    /// 提交上传
    pub async fn submit(&self) -> Result<Dispatch, FlowError> {
        self.request(|reply| FlowCommand::Submit { reply }).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::FakeCamera;
    use crate::models::{AppConfig, CaptureSettings, UploadSettings};
    use crate::permission::tests::FakePermission;
    use crate::permission::{DevicePermission, PermissionProvider};
    use crate::upload::UploadState;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::Notify;

    /// 可控的上传实现：记录调用次数，等待放行后返回预设结果
    struct FakeUploader {
        calls: AtomicUsize,
        release: Notify,
        gated: bool,
        result: Result<String, FlowError>,
        forms: Mutex<Vec<UploadForm>>,
    }

    impl FakeUploader {
        fn new(result: Result<String, FlowError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                release: Notify::new(),
                gated: false,
                result,
                forms: Mutex::new(Vec::new()),
            }
        }

        fn gated(result: Result<String, FlowError>) -> Self {
            Self {
                gated: true,
                ..Self::new(result)
            }
        }
    }

    #[async_trait]
    impl RecipeUploader for FakeUploader {
        async fn upload(
            &self,
            _settings: &UploadSettings,
            form: UploadForm,
        ) -> Result<String, FlowError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.forms.lock().unwrap().push(form);
            if self.gated {
                self.release.notified().await;
            }
            self.result.clone()
        }
    }

    struct Harness {
        handle: FlowHandle,
        uploader: Arc<FakeUploader>,
        camera: Arc<FakeCamera>,
        settings: Arc<SettingsManager>,
        errors: Arc<Mutex<Vec<String>>>,
        dir: TempDir,
    }

    async fn harness(permission: FakePermission, uploader: FakeUploader) -> Harness {
        harness_with(Box::new(permission), uploader).await
    }

    async fn harness_with(
        permission: Box<dyn PermissionProvider>,
        uploader: FakeUploader,
    ) -> Harness {
        let dir = tempdir().unwrap();
        let settings = Arc::new(
            SettingsManager::new(dir.path().join("config.json"))
                .await
                .unwrap(),
        );
        std::fs::create_dir_all(dir.path().join("photos")).unwrap();
        let camera = Arc::new(FakeCamera::default());
        let uploader = Arc::new(uploader);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();

        let (actor, handle) = FlowActor::new(
            PermissionGate::new(permission),
            CaptureSession::new(camera.clone(), dir.path().join("photos")),
            uploader.clone(),
            settings.clone(),
            Arc::new(EventBus::new(64)),
            Arc::new(move |e: &FlowError| sink.lock().unwrap().push(e.to_string())),
        );
        tokio::spawn(actor.run());

        Harness {
            handle,
            uploader,
            camera,
            settings,
            errors,
            dir,
        }
    }

    /// 在临时目录放一张照片并打开其预览屏幕
    async fn open_preview(h: &Harness) -> String {
        let path = h.dir.path().join("IMG_20240101_120000.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let uri = CapturedPhoto::new(path).uri();
        h.handle
            .navigate(Screen::Preview {
                photo_uri: uri.clone(),
            })
            .await
            .unwrap();
        uri
    }

    #[tokio::test]
    async fn test_permission_denied_returns_to_main() {
        let h = harness(FakePermission::new(false, false), FakeUploader::new(Ok(String::new()))).await;

        let snapshot = h.handle.navigate_route("camera").await.unwrap();
        assert_eq!(snapshot.screen, Screen::Main);
        assert!(!snapshot.can_go_back);
        assert_eq!(
            h.errors.lock().unwrap().as_slice(),
            &["Разрешение на использование камеры не предоставлено".to_string()]
        );
        assert_eq!(h.camera.binds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_capture_then_preview() {
        let h = harness(FakePermission::new(true, true), FakeUploader::new(Ok(String::new()))).await;

        let snapshot = h.handle.navigate(Screen::Camera).await.unwrap();
        assert!(snapshot.camera_ready);
        assert_eq!(snapshot.animation, Animation::SlideVertical);

        let snapshot = h.handle.shutter().await.unwrap().settle().await.unwrap();
        let Screen::Preview { photo_uri } = &snapshot.screen else {
            panic!("应进入预览屏幕: {:?}", snapshot.screen);
        };
        let photo = CapturedPhoto::from_uri(photo_uri).unwrap();
        assert!(photo.path().exists());
        assert!(photo.file_name().starts_with("IMG_"));
        assert!(!snapshot.camera_ready);
        assert_eq!(h.camera.unbinds.load(Ordering::SeqCst), 1);

        // 路由中携带的就是这张照片
        let parsed = Screen::parse_route(&snapshot.route).unwrap();
        assert_eq!(parsed, snapshot.screen);
        assert_eq!(snapshot.preview.unwrap().state, UploadState::Idle);
    }

    #[tokio::test]
    async fn test_capture_failure_stays_on_camera() {
        let h = harness(FakePermission::new(true, true), FakeUploader::new(Ok(String::new()))).await;
        h.camera.fail_capture.store(true, Ordering::SeqCst);

        h.handle.navigate(Screen::Camera).await.unwrap();
        let snapshot = h.handle.shutter().await.unwrap().settle().await.unwrap();
        assert_eq!(snapshot.screen, Screen::Camera);
        assert!(!snapshot.capturing);
        assert!(h.errors.lock().unwrap()[0].starts_with("Ошибка съёмки"));
    }

    #[tokio::test]
    async fn test_shutter_outside_camera_is_rejected() {
        let h = harness(FakePermission::new(true, true), FakeUploader::new(Ok(String::new()))).await;
        assert!(matches!(
            h.handle.shutter().await,
            Err(FlowError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_successful_upload_shows_recipe_and_back_goes_to_main() {
        let h = harness(
            FakePermission::new(true, true),
            FakeUploader::new(Ok("Recipe: Tomato Soup".to_string())),
        )
        .await;

        h.handle.navigate(Screen::Camera).await.unwrap();
        let preview = h.handle.shutter().await.unwrap().settle().await.unwrap();
        let Screen::Preview { photo_uri } = preview.screen else {
            panic!("应进入预览屏幕");
        };

        h.handle.set_caption("  ".to_string()).await.unwrap();
        let snapshot = h.handle.submit().await.unwrap().settle().await.unwrap();

        let recipe = snapshot.recipe.unwrap();
        assert_eq!(recipe.text, "Recipe: Tomato Soup");
        assert_eq!(recipe.photo_uri.as_deref(), Some(photo_uri.as_str()));
        assert_eq!(h.uploader.forms.lock().unwrap()[0].caption, None);

        let back = h.handle.back().await.unwrap();
        assert_eq!(back.screen, Screen::Main);
        assert!(!back.can_go_back);
    }

    #[tokio::test]
    async fn test_server_error_keeps_preview_resubmittable() {
        let h = harness(
            FakePermission::new(true, true),
            FakeUploader::new(Err(FlowError::Server {
                status: 500,
                body: "server error".to_string(),
            })),
        )
        .await;
        open_preview(&h).await;

        let snapshot = h.handle.submit().await.unwrap().settle().await.unwrap();
        assert!(matches!(snapshot.screen, Screen::Preview { .. }));
        let preview = snapshot.preview.unwrap();
        assert!(preview.submit_enabled);
        let notice = preview.notice.unwrap();
        assert!(notice.contains("500") && notice.contains("server error"));
        assert_eq!(h.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_only_one_upload_in_flight() {
        let h = harness(
            FakePermission::new(true, true),
            FakeUploader::gated(Ok("ok".to_string())),
        )
        .await;
        open_preview(&h).await;
        h.handle.set_caption("суп".to_string()).await.unwrap();

        let first = h.handle.submit().await.unwrap();
        assert!(matches!(first, Dispatch::Started(_)));

        for _ in 0..3 {
            match h.handle.submit().await.unwrap() {
                Dispatch::Done(snapshot) => {
                    let preview = snapshot.preview.unwrap();
                    assert_eq!(preview.state, UploadState::Sending);
                    assert!(!preview.submit_enabled);
                }
                Dispatch::Started(_) => panic!("不应启动第二个上传"),
            }
        }

        // 等待后台任务真正进入上传
        while h.uploader.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        h.uploader.release.notify_one();
        let snapshot = first.settle().await.unwrap();
        assert!(matches!(snapshot.screen, Screen::Recipe { .. }));
        assert_eq!(h.uploader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.uploader.forms.lock().unwrap()[0].caption.as_deref(),
            Some("суп")
        );
    }

    #[tokio::test]
    async fn test_missing_file_makes_no_network_call() {
        let h = harness(FakePermission::new(true, true), FakeUploader::new(Ok("x".to_string()))).await;
        let missing = CapturedPhoto::new(PathBuf::from("/nonexistent/IMG_1.jpg")).uri();
        h.handle
            .navigate(Screen::Preview { photo_uri: missing })
            .await
            .unwrap();

        let snapshot = h.handle.submit().await.unwrap().settle().await.unwrap();
        assert_eq!(h.uploader.calls.load(Ordering::SeqCst), 0);
        let preview = snapshot.preview.unwrap();
        assert!(preview.submit_enabled);
        assert!(preview.notice.unwrap().starts_with("Файл не найден"));
        assert_eq!(h.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_leaving_preview_drops_late_result() {
        let h = harness(
            FakePermission::new(true, true),
            FakeUploader::gated(Ok("late".to_string())),
        )
        .await;
        open_preview(&h).await;

        let pending = h.handle.submit().await.unwrap();
        h.handle.back().await.unwrap();

        while h.uploader.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        h.uploader.release.notify_one();
        let snapshot = pending.settle().await.unwrap();
        assert_eq!(snapshot.screen, Screen::Main);
        assert!(snapshot.preview.is_none());
    }

    #[tokio::test]
    async fn test_camera_bind_failure_keeps_screen() {
        let h = harness(FakePermission::new(true, true), FakeUploader::new(Ok(String::new()))).await;
        h.camera.fail_bind.store(true, Ordering::SeqCst);

        let snapshot = h.handle.navigate(Screen::Camera).await.unwrap();
        assert_eq!(snapshot.screen, Screen::Camera);
        assert!(!snapshot.camera_ready);
        assert!(h.errors.lock().unwrap()[0].starts_with("Ошибка камеры"));
    }

    async fn use_device(h: &Harness, device: &str) {
        h.settings
            .update(AppConfig {
                capture: Some(CaptureSettings {
                    device: device.to_string(),
                    input_format: "v4l2".to_string(),
                    ..CaptureSettings::default()
                }),
                ..AppConfig::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_device_reports_camera_error_on_camera_screen() {
        let h = harness_with(
            Box::new(DevicePermission::new()),
            FakeUploader::new(Ok(String::new())),
        )
        .await;
        use_device(&h, "/nonexistent/video99").await;
        // 设备不存在时由相机绑定失败
        h.camera.fail_bind.store(true, Ordering::SeqCst);

        let snapshot = h.handle.navigate(Screen::Camera).await.unwrap();
        assert_eq!(snapshot.screen, Screen::Camera);
        assert!(!snapshot.camera_ready);

        let errors = h.errors.lock().unwrap().clone();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Ошибка камеры"), "{}", errors[0]);
    }

    #[tokio::test]
    async fn test_permission_follows_updated_device() {
        let permission = FakePermission::new(true, true);
        let devices = permission.devices.clone();
        let h = harness(permission, FakeUploader::new(Ok(String::new()))).await;

        use_device(&h, "/dev/video0").await;
        h.handle.navigate(Screen::Camera).await.unwrap();
        h.handle.back().await.unwrap();

        use_device(&h, "/dev/video2").await;
        h.handle.navigate(Screen::Camera).await.unwrap();

        assert_eq!(
            devices.lock().unwrap().as_slice(),
            &["/dev/video0".to_string(), "/dev/video2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_capture_failure_after_leaving_camera_is_dropped() {
        let h = harness(FakePermission::new(true, true), FakeUploader::new(Ok(String::new()))).await;
        h.camera.hold_capture.store(true, Ordering::SeqCst);
        h.camera.fail_capture.store(true, Ordering::SeqCst);

        h.handle.navigate(Screen::Camera).await.unwrap();
        let pending = h.handle.shutter().await.unwrap();
        assert!(matches!(pending, Dispatch::Started(_)));

        h.handle.back().await.unwrap();
        h.camera.release_capture.notify_one();

        let snapshot = pending.settle().await.unwrap();
        assert_eq!(snapshot.screen, Screen::Main);
        assert!(!snapshot.capturing);
        assert!(h.errors.lock().unwrap().is_empty());
    }
}
