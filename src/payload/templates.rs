//! Embedded shell templates, one per component variant.
//!
//! Every template starts with the shared preamble, defines the component
//! hooks (`detect_version`, `functional_check`, `install_component`,
//! `requires_reboot`, `verify_component`) and finishes with `run_contract`.
//! Values are rendered through the `shq` helper so they arrive shell quoted.

pub const PREAMBLE_PARTIAL: &str = "preamble";

pub const PREAMBLE: &str = r#"#!/usr/bin/env bash
set -euo pipefail

COMPONENT={{shq kind}}
SOURCE={{shq source}}
EXPECTED_VERSION={{shq expected_version}}
SOURCE_LABEL={{shq label}}
SOURCE_REPO={{shq repo}}
SOURCE_REF={{shq reference}}
SOURCE_BRANCH={{shq branch}}
CHANNEL={{shq channel}}
STATE_DIR={{shq state_dir}}
RETRY_ATTEMPTS={{retry_attempts}}
RETRY_DELAY={{retry_delay}}
RETRY_LINEAR={{shq retry_linear}}
ALLOW_REBOOT={{shq allow_reboot}}
SRC_ROOT=/usr/local/src/gpu-stack
MARKER="${STATE_DIR}/${COMPONENT}.json"
PROVENANCE="${STATE_DIR}/provenance/${COMPONENT}.json"
SOURCE_COMMIT=""

log() { echo "[gpu-stack] [${COMPONENT}] $*" >&2; }

report() {
  printf '@@gpu-stack-result {"state":"%s","version":"%s"}\n' "$1" "${2:-}"
}

ensure_dir() { [[ -d "$1" ]] || mkdir -p "$1"; }

with_retry() {
  local attempt=1 delay
  until "$@"; do
    if (( attempt >= RETRY_ATTEMPTS )); then
      log "giving up after ${attempt} attempts: $*"
      return 1
    fi
    delay="${RETRY_DELAY}"
    [[ "${RETRY_LINEAR}" == "true" ]] && delay=$(( RETRY_DELAY * attempt ))
    log "attempt ${attempt}/${RETRY_ATTEMPTS} failed, retrying in ${delay}s: $*"
    sleep "${delay}"
    attempt=$(( attempt + 1 ))
  done
}

apt_refresh() { with_retry apt-get update -q; }

apt_install() {
  with_retry env DEBIAN_FRONTEND=noninteractive apt-get install -y -q --no-install-recommends "$@"
}

add_apt_source() {
  local keyring="/etc/apt/keyrings/$1.gpg" list="/etc/apt/sources.list.d/$1.list"
  ensure_dir /etc/apt/keyrings
  if [[ ! -s "${keyring}" ]]; then
    with_retry bash -c "curl -fsSL '$2' | gpg --batch --yes --dearmor -o '${keyring}'"
  fi
  if [[ ! -f "${list}" ]] || ! grep -qxF "$3" "${list}"; then
    echo "$3" > "${list}"
  fi
}

checkout_source() {
  local repo="$1" ref="$2" dir="$3"
  if [[ ! -d "${dir}/.git" ]]; then
    ensure_dir "$(dirname "${dir}")"
    with_retry git clone -q "${repo}" "${dir}"
  fi
  with_retry git -C "${dir}" fetch -q --depth 1 origin "${ref}"
  git -C "${dir}" checkout -q FETCH_HEAD
  SOURCE_COMMIT="$(git -C "${dir}" rev-parse HEAD)"
}

checkout_requested_source() {
  case "${SOURCE}" in
    git) checkout_source "${SOURCE_REPO}" "${SOURCE_REF}" "$1" ;;
    latest) checkout_source "${SOURCE_REPO}" "${SOURCE_BRANCH}" "$1" ;;
    *) log "no source checkout for ${SOURCE}"; return 1 ;;
  esac
}

enable_service() {
  systemctl daemon-reload
  systemctl is-enabled --quiet "$1" || systemctl enable "$1"
  systemctl is-active --quiet "$1" || systemctl start "$1"
}

marker_status() {
  if [[ -f "${MARKER}" ]]; then
    sed -n 's/.*"status": *"\([a-z_]*\)".*/\1/p' "${MARKER}"
  else
    echo absent
  fi
}

write_marker() {
  ensure_dir "${STATE_DIR}"
  local tmp="${MARKER}.tmp.$$"
  printf '{"kind":"%s","status":"%s","version":"%s","installed_at":"%s"}\n' \
    "${COMPONENT}" "$1" "${2:-}" "$(date -u +%Y-%m-%dT%H:%M:%SZ)" > "${tmp}"
  mv "${tmp}" "${MARKER}"
}

write_provenance() {
  ensure_dir "${STATE_DIR}/provenance"
  local tmp="${PROVENANCE}.tmp.$$"
  printf '{"kind":"%s","source":"%s","version":"%s","commit":"%s","repo":"%s","host":"%s","recorded_at":"%s"}\n' \
    "${COMPONENT}" "${SOURCE}" "${1:-${SOURCE_LABEL}}" "${SOURCE_COMMIT}" "${SOURCE_REPO}" \
    "$(hostname)" "$(date -u +%Y-%m-%dT%H:%M:%SZ)" > "${tmp}"
  mv "${tmp}" "${PROVENANCE}"
}

version_matches() {
  [[ -z "${EXPECTED_VERSION}" ]] && return 0
  [[ "${1#v}" == "${EXPECTED_VERSION#v}" ]]
}

request_reboot() {
  if [[ "${ALLOW_REBOOT}" == "true" ]]; then
    log "rebooting host in one minute"
    shutdown -r +1 "gpu-stack: ${COMPONENT} installation" || true
  else
    log "reboot the host and re-run provisioning to continue"
  fi
}

run_contract() {
  local installed="" matching=false functional=false verified
  log "checking"
  if ! installed="$(detect_version 2>/dev/null)"; then
    installed=""
  fi
  if [[ -n "${installed}" ]] && version_matches "${installed}"; then
    matching=true
    if functional_check; then functional=true; fi
  fi

  if [[ "${matching}" == "true" && "${functional}" == "true" ]]; then
    if [[ "$(marker_status)" == "pending_reboot" ]]; then
      log "came up after reboot (${installed})"
      write_marker installed "${installed}"
      write_provenance "${installed}"
    else
      log "already satisfied (${installed})"
    fi
    report already_satisfied "${installed}"
    return 0
  fi

  if [[ "$(marker_status)" == "pending_reboot" ]]; then
    log "installation is waiting for a host reboot, not reinstalling"
    report pending_reboot "${EXPECTED_VERSION}"
    return 0
  fi

  if [[ "${matching}" == "true" ]]; then
    log "present but not functional, repairing"
  elif [[ -n "${installed}" ]]; then
    log "found ${installed}, want ${EXPECTED_VERSION}, installing"
  else
    log "not present, installing"
  fi

  install_component

  if requires_reboot; then
    write_marker pending_reboot "${EXPECTED_VERSION}"
    request_reboot
    report pending_reboot "${EXPECTED_VERSION}"
    return 0
  fi

  if ! verified="$(verify_component)"; then
    log "functional verification failed"
    return 1
  fi

  write_marker installed "${verified}"
  write_provenance "${verified}"
  log "installed ${verified}"
  report installed "${verified}"
}
"#;

pub const KERNEL: &str = r#"{{> preamble}}
detect_version() { uname -r; }

functional_check() { [[ -d "/lib/modules/$(uname -r)" ]]; }

install_component() {
  local flavour="${EXPECTED_VERSION:-generic}"
  apt_refresh
  apt_install "linux-image-${flavour}" "linux-headers-${flavour}" "linux-modules-extra-${flavour}"
}

requires_reboot() {
  [[ -n "${EXPECTED_VERSION}" && "$(uname -r)" != "${EXPECTED_VERSION}" ]]
}

verify_component() {
  functional_check && uname -r
}

run_contract
"#;

pub const DRIVER: &str = r#"{{> preamble}}
detect_version() {
  command -v nvidia-smi >/dev/null || return 1
  nvidia-smi --query-gpu=driver_version --format=csv,noheader | head -n1
}

functional_check() { nvidia-smi -L >/dev/null 2>&1 && [[ -e /dev/nvidiactl ]]; }

install_component() {
  apt_refresh
  apt_install "linux-headers-$(uname -r)" build-essential dkms
  case "${SOURCE}" in
    package)
      local distro
      distro="$(. /etc/os-release && echo "${ID}${VERSION_ID//./}")"
      add_apt_source cuda \
        "https://developer.download.nvidia.com/compute/cuda/repos/${distro}/x86_64/3bf863cc.pub" \
        "deb [signed-by=/etc/apt/keyrings/cuda.gpg] https://developer.download.nvidia.com/compute/cuda/repos/${distro}/x86_64/ /"
      apt_refresh
      if [[ -n "${EXPECTED_VERSION}" ]]; then
        apt_install "cuda-drivers=${EXPECTED_VERSION}*"
      elif [[ -n "${CHANNEL}" ]]; then
        apt_install "cuda-drivers-${CHANNEL}"
      else
        apt_install cuda-drivers
      fi
      ;;
    *)
      checkout_requested_source "${SRC_ROOT}/open-gpu-kernel-modules"
      make -C "${SRC_ROOT}/open-gpu-kernel-modules" modules -j"$(nproc)"
      make -C "${SRC_ROOT}/open-gpu-kernel-modules" modules_install
      depmod -a
      ;;
  esac
}

requires_reboot() { ! modprobe nvidia 2>/dev/null; }

verify_component() {
  functional_check || return 1
  detect_version
}

run_contract
"#;

pub const CONTAINERD: &str = r#"{{> preamble}}
detect_version() {
  command -v containerd >/dev/null || return 1
  containerd --version | awk '{print $3}'
}

functional_check() {
  systemctl is-active --quiet containerd && ctr version >/dev/null 2>&1
}

install_component() {
  case "${SOURCE}" in
    package)
      apt_refresh
      apt_install ca-certificates curl gnupg
      add_apt_source docker "https://download.docker.com/linux/ubuntu/gpg" \
        "deb [signed-by=/etc/apt/keyrings/docker.gpg] https://download.docker.com/linux/ubuntu $(. /etc/os-release && echo "${VERSION_CODENAME}") stable"
      apt_refresh
      if [[ -n "${EXPECTED_VERSION}" ]]; then
        apt_install "containerd.io=${EXPECTED_VERSION}-*"
      else
        apt_install containerd.io
      fi
      ;;
    *)
      apt_refresh
      apt_install build-essential git golang-go libseccomp-dev pkg-config
      checkout_requested_source "${SRC_ROOT}/containerd"
      make -C "${SRC_ROOT}/containerd"
      make -C "${SRC_ROOT}/containerd" install
      if [[ ! -f /etc/systemd/system/containerd.service ]]; then
        install -m 0644 "${SRC_ROOT}/containerd/containerd.service" /etc/systemd/system/containerd.service
      fi
      ;;
  esac
  ensure_dir /etc/containerd
  if [[ ! -s /etc/containerd/config.toml ]] || grep -q 'disabled_plugins = \["cri"\]' /etc/containerd/config.toml; then
    containerd config default > /etc/containerd/config.toml
    sed -i 's/SystemdCgroup = false/SystemdCgroup = true/' /etc/containerd/config.toml
  fi
  enable_service containerd
  systemctl restart containerd
}

requires_reboot() { return 1; }

verify_component() {
  with_retry ctr version >/dev/null || return 1
  detect_version
}

run_contract
"#;

pub const DOCKER: &str = r#"{{> preamble}}
CRI_DOCKERD_VERSION=0.3.15

detect_version() {
  command -v docker >/dev/null || return 1
  docker version 2>/dev/null | awk '/^Server/ {server=1} server && $1 == "Version:" {print $2; exit}'
}

functional_check() {
  systemctl is-active --quiet docker && docker info >/dev/null 2>&1 && systemctl is-active --quiet cri-docker.socket
}

install_cri_dockerd() {
  if ! command -v cri-dockerd >/dev/null; then
    local archive="/tmp/cri-dockerd-${CRI_DOCKERD_VERSION}.tgz"
    [[ -s "${archive}" ]] || with_retry curl -fsSL -o "${archive}" \
      "https://github.com/Mirantis/cri-dockerd/releases/download/v${CRI_DOCKERD_VERSION}/cri-dockerd-${CRI_DOCKERD_VERSION}.amd64.tgz"
    tar -xzf "${archive}" -C /tmp
    install -m 0755 /tmp/cri-dockerd/cri-dockerd /usr/local/bin/cri-dockerd
  fi
  for unit in cri-docker.service cri-docker.socket; do
    if [[ ! -f "/etc/systemd/system/${unit}" ]]; then
      with_retry curl -fsSL -o "/etc/systemd/system/${unit}" \
        "https://raw.githubusercontent.com/Mirantis/cri-dockerd/v${CRI_DOCKERD_VERSION}/packaging/systemd/${unit}"
      sed -i 's,/usr/bin/cri-dockerd,/usr/local/bin/cri-dockerd,' "/etc/systemd/system/${unit}"
    fi
  done
  enable_service cri-docker.socket
}

install_component() {
  case "${SOURCE}" in
    package)
      apt_refresh
      apt_install ca-certificates curl gnupg
      add_apt_source docker "https://download.docker.com/linux/ubuntu/gpg" \
        "deb [signed-by=/etc/apt/keyrings/docker.gpg] https://download.docker.com/linux/ubuntu $(. /etc/os-release && echo "${VERSION_CODENAME}") stable"
      apt_refresh
      if [[ -n "${EXPECTED_VERSION}" ]]; then
        local pinned
        pinned="$(apt-cache madison docker-ce | awk '{print $3}' | grep -F ":${EXPECTED_VERSION}-" | head -n1)"
        [[ -n "${pinned}" ]] || { log "docker-ce ${EXPECTED_VERSION} not available"; return 1; }
        apt_install "docker-ce=${pinned}" "docker-ce-cli=${pinned}" containerd.io
      else
        apt_install docker-ce docker-ce-cli containerd.io
      fi
      ;;
    *)
      apt_refresh
      apt_install build-essential git golang-go containerd
      checkout_requested_source "${SRC_ROOT}/moby"
      (cd "${SRC_ROOT}/moby" && ./hack/make.sh binary)
      install -m 0755 "${SRC_ROOT}"/moby/bundles/binary-daemon/dockerd /usr/local/bin/dockerd
      if [[ ! -f /etc/systemd/system/docker.service ]]; then
        install -m 0644 "${SRC_ROOT}/moby/contrib/init/systemd/docker.service" /etc/systemd/system/docker.service
        install -m 0644 "${SRC_ROOT}/moby/contrib/init/systemd/docker.socket" /etc/systemd/system/docker.socket
      fi
      ;;
  esac
  enable_service docker
  install_cri_dockerd
}

requires_reboot() { return 1; }

verify_component() {
  with_retry docker info >/dev/null || return 1
  detect_version
}

run_contract
"#;

pub const CRIO: &str = r#"{{> preamble}}
detect_version() {
  command -v crio >/dev/null || return 1
  crio --version | awk '/^Version:/ {print $2}'
}

functional_check() {
  systemctl is-active --quiet crio && crictl --runtime-endpoint unix:///var/run/crio/crio.sock version >/dev/null 2>&1
}

install_component() {
  case "${SOURCE}" in
    package)
      local minor="${EXPECTED_VERSION:-1.31.0}"
      minor="v$(echo "${minor#v}" | cut -d. -f1,2)"
      apt_refresh
      apt_install ca-certificates curl gnupg
      add_apt_source cri-o "https://pkgs.k8s.io/addons:/cri-o:/stable:/${minor}/deb/Release.key" \
        "deb [signed-by=/etc/apt/keyrings/cri-o.gpg] https://pkgs.k8s.io/addons:/cri-o:/stable:/${minor}/deb/ /"
      apt_refresh
      if [[ -n "${EXPECTED_VERSION}" ]]; then
        apt_install "cri-o=${EXPECTED_VERSION#v}*"
      else
        apt_install cri-o
      fi
      ;;
    *)
      apt_refresh
      apt_install build-essential git golang-go libgpgme-dev libseccomp-dev pkg-config
      checkout_requested_source "${SRC_ROOT}/cri-o"
      make -C "${SRC_ROOT}/cri-o" binaries
      make -C "${SRC_ROOT}/cri-o" install.bin install.systemd
      ;;
  esac
  enable_service crio
}

requires_reboot() { return 1; }

verify_component() {
  with_retry crictl --runtime-endpoint unix:///var/run/crio/crio.sock version >/dev/null || return 1
  detect_version
}

run_contract
"#;

pub const TOOLKIT: &str = r#"{{> preamble}}
RUNTIME={{shq runtime}}
ENABLE_CDI={{shq enable_cdi}}

detect_version() {
  command -v nvidia-ctk >/dev/null || return 1
  nvidia-ctk --version | awk '/version/ {print $NF; exit}'
}

functional_check() {
  if [[ "${ENABLE_CDI}" == "true" ]]; then
    nvidia-ctk cdi list 2>/dev/null | grep -q 'nvidia.com/gpu'
  else
    nvidia-container-cli info >/dev/null 2>&1
  fi
}

install_component() {
  case "${SOURCE}" in
    package)
      add_apt_source nvidia-container-toolkit \
        "https://nvidia.github.io/libnvidia-container/gpgkey" \
        "deb [signed-by=/etc/apt/keyrings/nvidia-container-toolkit.gpg] https://nvidia.github.io/libnvidia-container/${CHANNEL:-stable}/deb/\$(ARCH) /"
      apt_refresh
      if [[ -n "${EXPECTED_VERSION}" ]]; then
        apt_install "nvidia-container-toolkit=${EXPECTED_VERSION}-1" "nvidia-container-toolkit-base=${EXPECTED_VERSION}-1"
      else
        apt_install nvidia-container-toolkit
      fi
      ;;
    *)
      apt_refresh
      apt_install build-essential git golang-go
      checkout_requested_source "${SRC_ROOT}/nvidia-container-toolkit"
      make -C "${SRC_ROOT}/nvidia-container-toolkit" cmds
      install -m 0755 "${SRC_ROOT}"/nvidia-container-toolkit/nvidia-ctk /usr/local/bin/nvidia-ctk
      install -m 0755 "${SRC_ROOT}"/nvidia-container-toolkit/nvidia-container-runtime /usr/local/bin/nvidia-container-runtime
      ;;
  esac

  if [[ -n "${RUNTIME}" ]]; then
    nvidia-ctk runtime configure --runtime="${RUNTIME}" --set-as-default
    systemctl restart "${RUNTIME}"
  fi
  if [[ "${ENABLE_CDI}" == "true" ]]; then
    ensure_dir /var/run/cdi
    nvidia-ctk cdi generate --output=/var/run/cdi/nvidia.yaml
  fi
}

requires_reboot() { return 1; }

verify_component() {
  functional_check || return 1
  detect_version
}

run_contract
"#;

pub const KUBEADM: &str = r#"{{> preamble}}
CRI_SOCKET={{shq cri_socket}}
KUBE_MINOR={{shq kube_minor}}
FEATURE_GATES={{shq feature_gates}}
KUBECONFIG=/etc/kubernetes/admin.conf
export KUBECONFIG

detect_version() {
  command -v kubectl >/dev/null && [[ -f "${KUBECONFIG}" ]] || return 1
  kubectl version -o json 2>/dev/null | sed -n 's/.*"gitVersion": *"\(v[^"]*\)".*/\1/p' | tail -n1
}

functional_check() {
  kubectl wait --for=condition=Ready nodes --all --timeout=30s >/dev/null 2>&1
}

install_binaries() {
  case "${SOURCE}" in
    release)
      apt_refresh
      apt_install apt-transport-https ca-certificates curl gpg conntrack socat
      add_apt_source kubernetes "https://pkgs.k8s.io/core:/stable:/${KUBE_MINOR}/deb/Release.key" \
        "deb [signed-by=/etc/apt/keyrings/kubernetes.gpg] https://pkgs.k8s.io/core:/stable:/${KUBE_MINOR}/deb/ /"
      apt_refresh
      apt_install "kubelet=${EXPECTED_VERSION#v}-*" "kubeadm=${EXPECTED_VERSION#v}-*" "kubectl=${EXPECTED_VERSION#v}-*"
      apt-mark hold kubelet kubeadm kubectl
      ;;
    *)
      apt_refresh
      apt_install build-essential git golang-go rsync conntrack socat
      checkout_requested_source "${SRC_ROOT}/kubernetes"
      make -C "${SRC_ROOT}/kubernetes" WHAT="cmd/kubeadm cmd/kubelet cmd/kubectl"
      install -m 0755 "${SRC_ROOT}"/kubernetes/_output/bin/{kubeadm,kubelet,kubectl} /usr/local/bin/
      if [[ ! -f /etc/systemd/system/kubelet.service ]]; then
        printf '[Unit]\nDescription=kubelet\n[Service]\nExecStart=/usr/local/bin/kubelet $KUBELET_KUBECONFIG_ARGS $KUBELET_CONFIG_ARGS $KUBELET_KUBEADM_ARGS\nRestart=always\n[Install]\nWantedBy=multi-user.target\n' \
          > /etc/systemd/system/kubelet.service
      fi
      ;;
  esac
  enable_service kubelet
}

install_component() {
  swapoff -a
  modprobe br_netfilter
  sysctl -q -w net.ipv4.ip_forward=1
  install_binaries

  if [[ ! -f "${KUBECONFIG}" ]]; then
    local args=(--pod-network-cidr=192.168.0.0/16)
    [[ -n "${CRI_SOCKET}" ]] && args+=(--cri-socket="${CRI_SOCKET}")
    [[ -n "${FEATURE_GATES}" ]] && args+=(--feature-gates="${FEATURE_GATES}")
    with_retry kubeadm init "${args[@]}"
  fi

  kubectl taint nodes --all node-role.kubernetes.io/control-plane- >/dev/null 2>&1 || true
  if ! kubectl get daemonset -n kube-system calico-node >/dev/null 2>&1; then
    with_retry kubectl apply -f https://raw.githubusercontent.com/projectcalico/calico/v3.28.1/manifests/calico.yaml
  fi
}

requires_reboot() { return 1; }

verify_component() {
  with_retry kubectl wait --for=condition=Ready nodes --all --timeout=300s >/dev/null || return 1
  detect_version
}

run_contract
"#;

pub const KIND: &str = r#"{{> preamble}}
KIND_VERSION=v0.24.0
KIND_CONFIG={{shq kind_config}}
CLUSTER_NAME=gpu-stack
KUBECTL="kubectl --context kind-${CLUSTER_NAME}"

detect_version() {
  command -v kind >/dev/null && kind get clusters 2>/dev/null | grep -qx "${CLUSTER_NAME}" || return 1
  ${KUBECTL} version -o json 2>/dev/null | sed -n 's/.*"gitVersion": *"\(v[^"]*\)".*/\1/p' | tail -n1
}

functional_check() {
  ${KUBECTL} wait --for=condition=Ready nodes --all --timeout=30s >/dev/null 2>&1
}

install_component() {
  if ! command -v kind >/dev/null; then
    with_retry curl -fsSL -o /usr/local/bin/kind "https://kind.sigs.k8s.io/dl/${KIND_VERSION}/kind-linux-amd64"
    chmod 0755 /usr/local/bin/kind
  fi
  if ! command -v kubectl >/dev/null; then
    with_retry curl -fsSL -o /usr/local/bin/kubectl "https://dl.k8s.io/release/${EXPECTED_VERSION:-$(curl -fsSL https://dl.k8s.io/release/stable.txt)}/bin/linux/amd64/kubectl"
    chmod 0755 /usr/local/bin/kubectl
  fi

  local image=""
  case "${SOURCE}" in
    release) image="kindest/node:${EXPECTED_VERSION}" ;;
    *)
      checkout_requested_source "${SRC_ROOT}/kubernetes"
      image="kindest/node:gpu-stack-${SOURCE_COMMIT:0:12}"
      docker image inspect "${image}" >/dev/null 2>&1 || kind build node-image --image "${image}" "${SRC_ROOT}/kubernetes"
      ;;
  esac

  if kind get clusters 2>/dev/null | grep -qx "${CLUSTER_NAME}"; then
    log "removing unhealthy cluster ${CLUSTER_NAME}"
    kind delete cluster --name "${CLUSTER_NAME}"
  fi
  local args=(--name "${CLUSTER_NAME}" --image "${image}" --wait 5m)
  [[ -n "${KIND_CONFIG}" ]] && args+=(--config "${KIND_CONFIG}")
  with_retry kind create cluster "${args[@]}"
}

requires_reboot() { return 1; }

verify_component() {
  with_retry ${KUBECTL} wait --for=condition=Ready nodes --all --timeout=300s >/dev/null || return 1
  detect_version
}

run_contract
"#;

pub const MICROK8S: &str = r#"{{> preamble}}
SNAP_CHANNEL={{shq snap_channel}}

detect_version() {
  command -v microk8s >/dev/null || return 1
  microk8s kubectl version -o json 2>/dev/null | sed -n 's/.*"gitVersion": *"\(v[^"]*\)".*/\1/p' | tail -n1
}

functional_check() {
  microk8s status --wait-ready --timeout 30 >/dev/null 2>&1
}

install_component() {
  if snap list microk8s >/dev/null 2>&1; then
    with_retry snap refresh microk8s --channel="${SNAP_CHANNEL}"
  else
    with_retry snap install microk8s --classic --channel="${SNAP_CHANNEL}"
  fi
  with_retry microk8s status --wait-ready --timeout 300
  microk8s enable dns >/dev/null
}

requires_reboot() { return 1; }

verify_component() {
  with_retry microk8s kubectl wait --for=condition=Ready nodes --all --timeout=300s >/dev/null || return 1
  detect_version
}

run_contract
"#;
